//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use firstmark_core::FirstmarkError;

/// Successful execution.
pub const SUCCESS: u8 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: u8 = 1;

/// Command line usage error (invalid arguments or configuration).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: u8 = 64;

/// Data format error (undecodable media, corrupt registry file).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: u8 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: u8 = 66;

/// The content is already registered to someone. Not an error of the
/// caller; scripts should treat it as a duplicate signal.
pub const DUPLICATE: u8 = 67;

/// I/O error (cannot write the registry file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: u8 = 74;

/// Permission denied (missing admin or arbitrator role).
/// Maps to EX_NOPERM from sysexits.h.
pub const UNAUTHORIZED: u8 = 77;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct CliExit {
    pub code: u8,
    pub message: Option<String>,
}

impl CliExit {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Registry errors carry their own classification
        let code = match err.chain().find_map(|e| e.downcast_ref::<FirstmarkError>()) {
            Some(core) => Self::classify(core),
            None if message.contains("Failed to read") => INPUT_ERROR,
            None if message.contains("Failed to write") => IO_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }

    fn classify(err: &FirstmarkError) -> u8 {
        match err {
            FirstmarkError::AlreadyRegistered(_) => DUPLICATE,
            FirstmarkError::Unauthorized(_) => UNAUTHORIZED,
            FirstmarkError::InvalidConfig(_) => USAGE_ERROR,
            FirstmarkError::UnsupportedMedia(_)
            | FirstmarkError::InvalidFingerprint(_)
            | FirstmarkError::LengthMismatch { .. }
            | FirstmarkError::SerializationError(_)
            | FirstmarkError::InvalidSnapshot(_)
            | FirstmarkError::UnsupportedSnapshotVersion(..)
            | FirstmarkError::SnapshotTooLarge { .. } => DATA_ERROR,
            FirstmarkError::NotFound(_)
            | FirstmarkError::EmptyReason
            | FirstmarkError::AlreadyResolved(_)
            | FirstmarkError::InvalidIdentity(_) => GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use firstmark_core::ExactHash;

    #[test]
    fn test_core_errors_found_through_context() {
        let err = Err::<(), _>(FirstmarkError::AlreadyRegistered(ExactHash::from_bytes(b"x")))
            .context("Submission rejected")
            .unwrap_err();
        assert_eq!(CliExit::from_anyhow(&err).code, DUPLICATE);

        let err = anyhow::Error::new(FirstmarkError::Unauthorized("bob".into()));
        assert_eq!(CliExit::from_anyhow(&err).code, UNAUTHORIZED);
    }

    #[test]
    fn test_message_fallback() {
        let err = anyhow::anyhow!("Failed to read file: missing.png");
        assert_eq!(CliExit::from_anyhow(&err).code, INPUT_ERROR);
        let err = anyhow::anyhow!("Failed to write registry: disk full");
        assert_eq!(CliExit::from_anyhow(&err).code, IO_ERROR);
        let err = anyhow::anyhow!("something else");
        assert_eq!(CliExit::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
