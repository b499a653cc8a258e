//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hoard_storage::StorageError;
use serde::{Deserialize, Serialize};

/// API error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("corrupt compression header: {0}")]
    CorruptHeader(String),

    #[error("corrupt compressed data: {0}")]
    CorruptData(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::InvalidDigest(_) => "invalid_digest",
            Self::CorruptHeader(_) => "corrupt_header",
            Self::CorruptData(_) => "corrupt_data",
            Self::DigestMismatch { .. } => "digest_mismatch",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_)
            | Self::InvalidDigest(_)
            | Self::CorruptHeader(_)
            | Self::CorruptData(_)
            | Self::DigestMismatch { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::InvalidDigest(msg) => Self::InvalidDigest(msg),
            StorageError::CorruptHeader(msg) => Self::CorruptHeader(msg),
            StorageError::CorruptData(msg) => Self::CorruptData(msg),
            StorageError::DigestMismatch { expected, actual } => {
                Self::DigestMismatch { expected, actual }
            }
            other => {
                tracing::error!(error = %other, "Storage failure");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<hoard_core::Error> for ApiError {
    fn from(err: hoard_core::Error) -> Self {
        use hoard_core::Error as E;
        match err {
            E::InvalidDigest(_)
            | E::CorruptHeader(_)
            | E::CorruptData(_)
            | E::DigestMismatch { .. }
            | E::Io(_) => StorageError::from(err).into(),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
