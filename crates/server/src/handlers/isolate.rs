//! Existence check and push endpoints of the isolate protocol.

use super::common::{parse_json, resolve_ticket};
use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use hoard_core::UploadTicket;
use hoard_core::protocol::{
    DigestCollection, FinalizeRequest, OkResponse, PreuploadStatus, StorageRequest, UrlCollection,
};
use tracing::{debug, info};

/// POST /_ah/api/isolateservice/v1/preupload
///
/// Returns a ticket for every item the namespace does not hold yet. Items
/// already present are left out; `index` points back into the request.
pub async fn preupload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<UrlCollection>> {
    let req: DigestCollection = parse_json(&headers, &body)?;
    let store = state.store_for(&req.namespace)?;
    let algo = store.namespace().digest_hash;

    let mut items = Vec::new();
    for (index, item) in req.items.iter().enumerate() {
        item.digest.validate(algo)?;
        if item.size < 0 {
            return Err(ApiError::BadRequest(format!(
                "item {index} has negative size {}",
                item.size
            )));
        }
        if !store.contains(&item.digest).await? {
            let ticket = UploadTicket::new(req.namespace.namespace.clone(), item.digest.clone());
            items.push(PreuploadStatus {
                gs_upload_url: None,
                upload_ticket: ticket.to_string(),
                index,
            });
        }
    }

    debug!(
        namespace = %req.namespace.namespace,
        requested = req.items.len(),
        missing = items.len(),
        "Preupload"
    );
    Ok(Json(UrlCollection { items }))
}

/// POST /_ah/api/isolateservice/v1/store_inline
///
/// Verifies the compressed content against the ticket's digest before
/// storing it.
pub async fn store_inline(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<OkResponse>> {
    let req: StorageRequest = parse_json(&headers, &body)?;
    let (ticket, store) = resolve_ticket(&state, &req.upload_ticket)?;
    let size = req.content.len();

    store
        .write_bytes(&ticket.digest, Bytes::from(req.content))
        .await?;

    info!(
        namespace = %ticket.namespace,
        digest = %ticket.digest,
        size,
        identity = ?identity,
        "Stored inline content"
    );
    Ok(Json(OkResponse::default()))
}

/// POST /_ah/api/isolateservice/v1/finalize_gs_upload
///
/// This server never hands out external upload URLs, so finalizing only
/// succeeds for content that is already stored.
pub async fn finalize_gs_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<OkResponse>> {
    let req: FinalizeRequest = parse_json(&headers, &body)?;
    let (ticket, store) = resolve_ticket(&state, &req.upload_ticket)?;

    if !store.contains(&ticket.digest).await? {
        return Err(ApiError::Conflict(format!(
            "no content uploaded for {}",
            ticket.digest
        )));
    }
    debug!(namespace = %ticket.namespace, digest = %ticket.digest, "Finalized");
    Ok(Json(OkResponse::default()))
}
