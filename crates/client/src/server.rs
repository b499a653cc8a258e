//! The isolate server abstraction shared by the HTTP and local clients.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use hoard_core::protocol::{PreuploadStatus, ServerDetails};
use hoard_core::{DigestItem, HexDigest, NamespaceSpec, decompress};
use tokio::io::AsyncRead;

/// Uncompressed content handed to [`IsolateServer::push`].
pub type ContentSource = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Per-item state passed from [`IsolateServer::contains`] to
/// [`IsolateServer::push`].
///
/// Owned by whoever pushes the item. `uploaded` flips once the bytes have
/// been sent, so pushing again after a failed finalize only re-finalizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushState {
    status: PreuploadStatus,
    uploaded: bool,
    finalized: bool,
}

impl PushState {
    pub fn new(status: PreuploadStatus) -> Self {
        Self {
            status,
            uploaded: false,
            finalized: false,
        }
    }

    pub fn ticket(&self) -> &str {
        &self.status.upload_ticket
    }

    /// External destination, if the server issued one.
    pub fn upload_url(&self) -> Option<&str> {
        self.status.gs_upload_url.as_deref()
    }

    /// Index of the item in the `contains` request.
    pub fn index(&self) -> usize {
        self.status.index
    }

    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn mark_uploaded(&mut self) {
        self.uploaded = true;
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }
}

/// A content-addressed store reachable by the archiver.
#[async_trait]
pub trait IsolateServer: Send + Sync + 'static {
    /// Namespace every call is scoped to.
    fn namespace(&self) -> &NamespaceSpec;

    /// Server version and capabilities.
    async fn server_capabilities(&self) -> ClientResult<ServerDetails>;

    /// Look up presence of multiple items.
    ///
    /// The result has the same length and order as `items`; `None` marks an
    /// item that is already present.
    async fn contains(&self, items: &[DigestItem]) -> ClientResult<Vec<Option<PushState>>>;

    /// Compress and send one item's content, then finalize if required.
    async fn push(&self, state: &mut PushState, source: ContentSource) -> ClientResult<()>;
}

/// Spread missing-item statuses back over the request positions.
pub(crate) fn align_statuses(
    len: usize,
    statuses: Vec<PreuploadStatus>,
) -> ClientResult<Vec<Option<PushState>>> {
    let mut out: Vec<Option<PushState>> = vec![None; len];
    for status in statuses {
        let index = status.index;
        let slot = out.get_mut(index).ok_or_else(|| {
            ClientError::Protocol(format!(
                "preupload index {index} out of range for {len} items"
            ))
        })?;
        if slot.is_some() {
            return Err(ClientError::Protocol(format!(
                "preupload index {index} returned twice"
            )));
        }
        *slot = Some(PushState::new(status));
    }
    Ok(out)
}

/// Decompress a stored entry and check it hashes to `digest`.
pub(crate) fn unpack_entry(
    namespace: &NamespaceSpec,
    digest: &HexDigest,
    stored: &[u8],
) -> ClientResult<Vec<u8>> {
    let content = decompress(namespace.compression, stored)?;
    let actual = namespace.digest_hash.compute(&content);
    if &actual != digest {
        return Err(hoard_core::Error::DigestMismatch {
            expected: digest.to_string(),
            actual: actual.to_string(),
        }
        .into());
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(index: usize) -> PreuploadStatus {
        PreuploadStatus {
            gs_upload_url: None,
            upload_ticket: format!("t{index}"),
            index,
        }
    }

    #[test]
    fn align_keeps_request_positions() {
        let aligned = align_statuses(4, vec![status(3), status(1)]).unwrap();
        assert!(aligned[0].is_none());
        assert_eq!(aligned[1].as_ref().unwrap().ticket(), "t1");
        assert!(aligned[2].is_none());
        assert_eq!(aligned[3].as_ref().unwrap().index(), 3);
    }

    #[test]
    fn align_rejects_bad_indices() {
        assert!(matches!(
            align_statuses(2, vec![status(2)]),
            Err(ClientError::Protocol(_))
        ));
        assert!(matches!(
            align_statuses(2, vec![status(0), status(0)]),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn new_state_is_pending() {
        let state = PushState::new(status(0));
        assert!(!state.is_uploaded());
        assert!(!state.is_finalized());
        assert_eq!(state.upload_url(), None);
    }
}
