//! Isolate server backed directly by a local content store.

use crate::error::{ClientError, ClientResult};
use crate::server::{ContentSource, IsolateServer, PushState, unpack_entry};
use async_trait::async_trait;
use futures::TryStreamExt;
use hoard_core::protocol::{PreuploadStatus, ServerDetails};
use hoard_core::{DigestItem, HexDigest, NamespaceSpec, UploadTicket, compress_reader};
use hoard_storage::{ContentStore, StorageError};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// Runs the isolate protocol in-process against a [`ContentStore`].
#[derive(Clone)]
pub struct LocalIsolateServer {
    store: Arc<dyn ContentStore>,
}

impl LocalIsolateServer {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Read an entry back, decompressed and verified.
    pub async fn fetch(&self, digest: &HexDigest) -> ClientResult<Vec<u8>> {
        digest.validate(self.namespace().digest_hash)?;
        let stored = self.store.read(digest).await?;
        unpack_entry(self.namespace(), digest, &stored)
    }

    fn ticket(&self, state: &PushState) -> ClientResult<UploadTicket> {
        let ticket: UploadTicket = state.ticket().parse()?;
        if ticket.namespace != self.namespace().namespace {
            return Err(ClientError::Protocol(format!(
                "ticket for namespace {:?} used with {:?}",
                ticket.namespace,
                self.namespace().namespace
            )));
        }
        Ok(ticket)
    }
}

#[async_trait]
impl IsolateServer for LocalIsolateServer {
    fn namespace(&self) -> &NamespaceSpec {
        self.store.namespace()
    }

    async fn server_capabilities(&self) -> ClientResult<ServerDetails> {
        Ok(ServerDetails {
            server_version: format!("local-{}", self.store.backend_name()),
        })
    }

    async fn contains(&self, items: &[DigestItem]) -> ClientResult<Vec<Option<PushState>>> {
        let namespace = &self.namespace().namespace;
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            item.digest.validate(self.namespace().digest_hash)?;
            if self.store.contains(&item.digest).await? {
                out.push(None);
            } else {
                let ticket = UploadTicket::new(namespace.clone(), item.digest.clone());
                out.push(Some(PushState::new(PreuploadStatus {
                    gs_upload_url: None,
                    upload_ticket: ticket.to_string(),
                    index,
                })));
            }
        }
        Ok(out)
    }

    async fn push(&self, state: &mut PushState, source: ContentSource) -> ClientResult<()> {
        if !state.is_uploaded() {
            let ticket = self.ticket(state)?;
            let compressed = compress_reader(self.namespace().compression, source);
            let stream = ReaderStream::new(compressed).map_err(StorageError::Io);
            self.store.write(&ticket.digest, Box::pin(stream)).await?;
            state.mark_uploaded();
        }
        state.mark_finalized();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::HashAlgo;
    use hoard_storage::MemoryBackend;
    use std::io::Cursor;

    fn server() -> LocalIsolateServer {
        LocalIsolateServer::new(Arc::new(MemoryBackend::new(NamespaceSpec::default())))
    }

    #[tokio::test]
    async fn contains_then_push() {
        let server = server();
        let items = vec![
            DigestItem::new(HashAlgo::Sha1.compute(b"foo"), 3),
            DigestItem::new(HashAlgo::Sha1.compute(b"bar"), 3),
        ];

        let states = server.contains(&items).await.unwrap();
        assert!(states.iter().all(Option::is_some));

        let mut state = states[0].clone().unwrap();
        server
            .push(&mut state, Box::new(Cursor::new(b"foo".to_vec())))
            .await
            .unwrap();
        assert!(state.is_uploaded() && state.is_finalized());

        assert_eq!(server.fetch(&items[0].digest).await.unwrap(), b"foo");

        let states = server.contains(&items).await.unwrap();
        assert!(states[0].is_none());
        assert_eq!(states[1].as_ref().unwrap().index(), 1);
    }

    #[tokio::test]
    async fn push_with_wrong_content_fails() {
        let server = server();
        let items = vec![DigestItem::new(HashAlgo::Sha1.compute(b"foo"), 3)];
        let mut state = server.contains(&items).await.unwrap().remove(0).unwrap();

        let err = server
            .push(&mut state, Box::new(Cursor::new(b"not foo".to_vec())))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ClientError::Storage(StorageError::DigestMismatch { .. })),
            "{err:?}"
        );
        assert!(!state.is_uploaded());
    }

    #[tokio::test]
    async fn invalid_digest_is_rejected() {
        let server = server();
        let items = vec![DigestItem::new(HashAlgo::Sha256.compute(b"foo"), 3)];
        assert!(matches!(
            server.contains(&items).await,
            Err(ClientError::Core(_))
        ));
    }
}
