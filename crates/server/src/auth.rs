//! Authentication seam and request middleware.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use hoard_core::config::AuthConfig;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, keeping printable
    /// ASCII only.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who made a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    /// Bearer token, identified by a prefix of its SHA-256 hash.
    Token { hash_prefix: String },
}

/// Decides whether a request may use the API.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, headers: &HeaderMap) -> ApiResult<Identity>;
}

/// Accepts every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAnonymous;

impl Authenticator for AllowAnonymous {
    fn authenticate(&self, _headers: &HeaderMap) -> ApiResult<Identity> {
        Ok(Identity::Anonymous)
    }
}

/// Accepts requests whose bearer token hashes to a configured SHA-256 value.
#[derive(Clone, Debug)]
pub struct BearerTokenAuthenticator {
    token_hashes: HashSet<String>,
}

impl BearerTokenAuthenticator {
    pub fn new(token_hashes: impl IntoIterator<Item = String>) -> Self {
        Self {
            token_hashes: token_hashes
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Authenticator for BearerTokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> ApiResult<Identity> {
        let token = extract_bearer_token(headers)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;
        let hash = hash_token(token);
        if !self.token_hashes.contains(&hash) {
            return Err(ApiError::Unauthorized("invalid token".to_string()));
        }
        Ok(Identity::Token {
            hash_prefix: hash[..12].to_string(),
        })
    }
}

/// Build the authenticator described by `config`.
pub fn from_config(config: &AuthConfig) -> std::sync::Arc<dyn Authenticator> {
    if config.is_enabled() {
        std::sync::Arc::new(BearerTokenAuthenticator::new(
            config.token_hashes.iter().cloned(),
        ))
    } else {
        std::sync::Arc::new(AllowAnonymous)
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

fn extract_or_generate_trace_id(headers: &HeaderMap) -> TraceId {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hex SHA-256 of a token, as stored in configuration.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Authenticate the request and run it inside a span carrying its trace ID.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let span = tracing::info_span!("request", trace_id = %trace_id);

    let identity = match state.authenticator.authenticate(req.headers()) {
        Ok(identity) => identity,
        Err(e) => {
            span.in_scope(|| tracing::debug!(error = %e, "Rejected request"));
            return Err(e);
        }
    };

    req.extensions_mut().insert(trace_id);
    req.extensions_mut().insert(identity);

    Ok(next.run(req).instrument(span).await)
}
