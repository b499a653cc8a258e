//! Server details endpoint.

use super::common::parse_json;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use hoard_core::protocol::{ServerDetails, ServerDetailsRequest};

/// POST /_ah/api/isolateservice/v1/server_details
///
/// The body must be `{}` (or empty, in which case no content type is
/// required).
pub async fn server_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ServerDetails>> {
    if !body.is_empty() {
        let _: ServerDetailsRequest = parse_json(&headers, &body)?;
    }
    Ok(Json(ServerDetails {
        server_version: state.config.server.server_version.clone(),
    }))
}
