//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use hoard_core::UploadTicket;
use hoard_core::protocol::JSON_CONTENT_TYPE;
use hoard_storage::ContentStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// True if `value` names `application/json`, ignoring parameters.
fn is_json(value: &HeaderValue) -> bool {
    value
        .to_str()
        .ok()
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Check the request Content-Type, then parse the JSON body.
pub fn parse_json<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> ApiResult<T> {
    match headers.get(CONTENT_TYPE) {
        Some(value) if is_json(value) => {}
        Some(value) => {
            return Err(ApiError::UnsupportedMediaType(format!(
                "expected {JSON_CONTENT_TYPE}, got {}",
                String::from_utf8_lossy(value.as_bytes())
            )));
        }
        None => {
            return Err(ApiError::UnsupportedMediaType(format!(
                "expected {JSON_CONTENT_TYPE}, got no content type"
            )));
        }
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Response middleware: JSON bodies are sent as `application/json; charset=utf-8`.
pub async fn json_charset(mut response: Response) -> Response {
    let headers = response.headers_mut();
    if headers.get(CONTENT_TYPE).is_some_and(is_json) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    }
    response
}

/// Parse an upload ticket and resolve the store it refers to.
pub fn resolve_ticket<'a>(
    state: &'a AppState,
    ticket: &str,
) -> ApiResult<(UploadTicket, &'a Arc<dyn ContentStore>)> {
    let ticket: UploadTicket = ticket.parse()?;
    let store = state.stores.get(&ticket.namespace).ok_or_else(|| {
        ApiError::BadRequest(format!("ticket for unknown namespace: {}", ticket.namespace))
    })?;
    ticket.digest.validate(store.namespace().digest_hash)?;
    Ok((ticket, store))
}
