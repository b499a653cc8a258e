//! Content retrieval.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use hoard_core::HexDigest;

/// GET /content-gs/retrieve/{namespace}/{digest}
///
/// Streams the entry exactly as stored, i.e. still compressed.
pub async fn retrieve(
    State(state): State<AppState>,
    Path((namespace, digest)): Path<(String, String)>,
) -> ApiResult<Response> {
    let store = state.store(&namespace)?;
    let digest = HexDigest::parse(&digest, store.namespace().digest_hash)?;
    let stream = store.read_stream(&digest).await?;

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}
