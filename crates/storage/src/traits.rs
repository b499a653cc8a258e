//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, stream};
use hoard_core::{HexDigest, NamespaceSpec};
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads and writes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Wrap a single buffer as a [`ByteStream`].
pub fn single_chunk(data: Bytes) -> ByteStream {
    Box::pin(stream::once(async move { Ok(data) }))
}

/// A content-addressed store scoped to one namespace.
///
/// Entries are keyed by the digest of their decompressed content and stored
/// exactly as received (still compressed). Entries are write-once.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// The namespace this store serves.
    fn namespace(&self) -> &NamespaceSpec;

    /// Check whether an entry exists. A malformed digest is never present.
    async fn contains(&self, digest: &HexDigest) -> StorageResult<bool>;

    /// Read an entry fully. Fails with `NotFound` if absent.
    async fn read(&self, digest: &HexDigest) -> StorageResult<Bytes>;

    /// Stream an entry. Fails with `NotFound` if absent.
    async fn read_stream(&self, digest: &HexDigest) -> StorageResult<ByteStream>;

    /// Verify and store compressed content under `digest`.
    ///
    /// The content is decompressed and hashed as it arrives. Nothing becomes
    /// visible unless the recomputed digest equals `digest`; on any error the
    /// store is left unchanged.
    async fn write(&self, digest: &HexDigest, data: ByteStream) -> StorageResult<()>;

    /// Convenience wrapper around [`ContentStore::write`] for a single buffer.
    async fn write_bytes(&self, digest: &HexDigest, data: Bytes) -> StorageResult<()> {
        self.write(digest, single_chunk(data)).await
    }

    /// Get the backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is usable. Called once at server startup.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
