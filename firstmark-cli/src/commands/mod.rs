//! Subcommand implementations.

pub mod detect;
pub mod dispute;
pub mod fingerprint;
pub mod init;
pub mod records;
pub mod role;
pub mod similar;
pub mod submit;
