//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("unknown hash algorithm \"{0}\"")]
    UnknownHashAlgo(String),

    #[error("unknown compression \"{0}\"")]
    UnknownCompression(String),

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("invalid upload ticket: {0}")]
    InvalidTicket(String),

    #[error("zlib: invalid header: {0}")]
    CorruptHeader(String),

    #[error("zlib: invalid data: {0}")]
    CorruptData(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
