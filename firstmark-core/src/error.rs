use thiserror::Error;

use crate::fingerprint::ExactHash;

/// Current registry snapshot format version.
pub const CURRENT_SNAPSHOT_VERSION: u8 = 1;

/// Maximum accepted snapshot size in bytes (64 MiB).
pub const MAX_SNAPSHOT_SIZE: usize = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FirstmarkError {
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Bit-string length mismatch: {left} bits vs {right} bits")]
    LengthMismatch { left: u32, right: u32 },

    #[error("Already registered: {0}")]
    AlreadyRegistered(ExactHash),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Dispute reason must not be empty")]
    EmptyReason,

    #[error("Dispute {0} is already resolved")]
    AlreadyResolved(u64),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Unsupported snapshot version {0} (current: {1})")]
    UnsupportedSnapshotVersion(u8, u8),

    #[error("Snapshot too large: {size} bytes (max {max})")]
    SnapshotTooLarge { size: usize, max: usize },
}

impl FirstmarkError {
    /// `AlreadyRegistered` is an expected outcome of a duplicate submission,
    /// not a failure of the caller.
    pub fn is_duplicate_signal(&self) -> bool {
        matches!(self, Self::AlreadyRegistered(_))
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedMedia(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, FirstmarkError>;
