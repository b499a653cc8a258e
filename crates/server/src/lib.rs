//! HTTP server for hoard content-addressed storage.
//!
//! This crate provides:
//! - The isolate protocol endpoints (server details, preupload, inline
//!   store, finalize)
//! - Content retrieval streaming
//! - Pluggable request authentication

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{AllowAnonymous, Authenticator, BearerTokenAuthenticator, Identity, TraceId};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
