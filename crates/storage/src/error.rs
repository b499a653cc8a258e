//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt compression header: {0}")]
    CorruptHeader(String),

    #[error("corrupt compressed data: {0}")]
    CorruptData(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// True for errors caused by the content or digest supplied by the caller,
    /// as opposed to failures of the backend itself.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidDigest(_)
                | Self::CorruptHeader(_)
                | Self::CorruptData(_)
                | Self::DigestMismatch { .. }
        )
    }
}

impl From<hoard_core::Error> for StorageError {
    fn from(err: hoard_core::Error) -> Self {
        use hoard_core::Error as E;
        match err {
            E::InvalidDigest(msg) => Self::InvalidDigest(msg),
            E::CorruptHeader(msg) => Self::CorruptHeader(msg),
            E::CorruptData(msg) => Self::CorruptData(msg),
            E::DigestMismatch { expected, actual } => Self::DigestMismatch { expected, actual },
            E::Io(e) => Self::Io(e),
            other => Self::Config(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
