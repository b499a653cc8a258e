//! In-memory storage backend.
//!
//! Content is buffered while it is verified and inserted under a single
//! mutex once the digest matches.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ContentStore, single_chunk};
use crate::verify::DigestVerifier;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use hoard_core::{HexDigest, NamespaceSpec};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::instrument;

/// In-memory content store for a single namespace.
pub struct MemoryBackend {
    namespace: NamespaceSpec,
    entries: Mutex<HashMap<HexDigest, Bytes>>,
}

impl MemoryBackend {
    pub fn new(namespace: NamespaceSpec) -> Self {
        Self {
            namespace,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn get(&self, digest: &HexDigest) -> StorageResult<Bytes> {
        digest.validate(self.namespace.digest_hash)?;
        self.entries
            .lock()
            .await
            .get(digest)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(digest.to_string()))
    }
}

#[async_trait]
impl ContentStore for MemoryBackend {
    fn namespace(&self) -> &NamespaceSpec {
        &self.namespace
    }

    async fn contains(&self, digest: &HexDigest) -> StorageResult<bool> {
        if !digest.is_valid(self.namespace.digest_hash) {
            return Ok(false);
        }
        Ok(self.entries.lock().await.contains_key(digest))
    }

    async fn read(&self, digest: &HexDigest) -> StorageResult<Bytes> {
        self.get(digest).await
    }

    async fn read_stream(&self, digest: &HexDigest) -> StorageResult<ByteStream> {
        Ok(single_chunk(self.get(digest).await?))
    }

    #[instrument(skip_all, fields(backend = "memory", digest = %digest))]
    async fn write(&self, digest: &HexDigest, mut data: ByteStream) -> StorageResult<()> {
        digest.validate(self.namespace.digest_hash)?;

        let mut staged = BytesMut::new();
        let mut verifier = DigestVerifier::new(&self.namespace, digest.clone());
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            verifier.update(&chunk)?;
            staged.extend_from_slice(&chunk);
        }
        if let Err(e) = verifier.finish() {
            tracing::warn!(error = %e, "rejected write");
            return Err(e);
        }

        let size = staged.len();
        self.entries
            .lock()
            .await
            .insert(digest.clone(), staged.freeze());
        tracing::debug!(size, "stored entry");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
