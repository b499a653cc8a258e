//! Local filesystem storage backend.
//!
//! Layout: `<root>/<namespace>/<hex[0..2]>/<hex[2..4]>/<hex>`. Content is
//! staged to a uniquely named temp file next to its final location, verified,
//! fsynced and then renamed into place. Rename is atomic, so a reader sees
//! either nothing or a complete verified entry. Concurrent writers of the
//! same digest each verify independently and the last rename wins; both
//! carry identical bytes.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ContentStore};
use crate::verify::DigestVerifier;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hoard_core::{HexDigest, NamespaceSpec};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem content store for a single namespace.
pub struct FilesystemBackend {
    root: PathBuf,
    namespace: NamespaceSpec,
}

impl FilesystemBackend {
    /// Open (creating if needed) the namespace directory under `root`.
    pub async fn new(root: impl AsRef<Path>, namespace: NamespaceSpec) -> StorageResult<Self> {
        namespace
            .validate()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        let root = root.as_ref().join(&namespace.namespace);
        fs::create_dir_all(&root).await?;
        Ok(Self { root, namespace })
    }

    /// Directory holding this namespace's entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sharded path of an entry. Validates the digest first, so the result
    /// never escapes the namespace directory.
    fn entry_path(&self, digest: &HexDigest) -> StorageResult<PathBuf> {
        digest.validate(self.namespace.digest_hash)?;
        let (a, b) = digest
            .shard()
            .ok_or_else(|| StorageError::InvalidDigest(digest.to_string()))?;
        Ok(self.root.join(a).join(b).join(digest.as_str()))
    }

    fn not_found(digest: &HexDigest, e: std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(digest.to_string())
        } else {
            StorageError::Io(e)
        }
    }

    /// Write the stream to `temp_path` while verifying it.
    async fn stage(
        &self,
        temp_path: &Path,
        digest: &HexDigest,
        mut data: ByteStream,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(temp_path).await?;
        let mut verifier = DigestVerifier::new(&self.namespace, digest.clone());
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            verifier.update(&chunk)?;
        }
        let verified = verifier.finish()?;
        // Ensure data is flushed to disk before rename
        file.sync_all().await?;
        Ok(verified.stored_size)
    }
}

#[async_trait]
impl ContentStore for FilesystemBackend {
    fn namespace(&self) -> &NamespaceSpec {
        &self.namespace
    }

    #[instrument(skip_all, fields(backend = "filesystem", digest = %digest))]
    async fn contains(&self, digest: &HexDigest) -> StorageResult<bool> {
        let Ok(path) = self.entry_path(digest) else {
            return Ok(false);
        };
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip_all, fields(backend = "filesystem", digest = %digest))]
    async fn read(&self, digest: &HexDigest) -> StorageResult<Bytes> {
        let path = self.entry_path(digest)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::not_found(digest, e))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip_all, fields(backend = "filesystem", digest = %digest))]
    async fn read_stream(&self, digest: &HexDigest) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.entry_path(digest)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::not_found(digest, e))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip_all, fields(backend = "filesystem", digest = %digest))]
    async fn write(&self, digest: &HexDigest, data: ByteStream) -> StorageResult<()> {
        let path = self.entry_path(digest)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_file_name(format!("{digest}.tmp.{}", Uuid::new_v4()));
        let size = match self.stage(&temp_path, digest, data).await {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                tracing::warn!(error = %e, "rejected write");
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        tracing::debug!(size, "stored entry");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let marker = self.root.join(format!(".health.{}", Uuid::new_v4()));
        fs::write(&marker, b"ok").await?;
        fs::remove_file(&marker).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::{Compression, HashAlgo, compress};

    async fn backend(dir: &Path) -> FilesystemBackend {
        FilesystemBackend::new(dir, NamespaceSpec::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path()).await;

        let digest = HashAlgo::Sha1.compute(b"hello world");
        let compressed = Bytes::from(compress(Compression::Zlib, b"hello world").await.unwrap());

        backend.write_bytes(&digest, compressed.clone()).await.unwrap();
        assert!(backend.contains(&digest).await.unwrap());
        assert_eq!(backend.read(&digest).await.unwrap(), compressed);

        let on_disk = dir
            .path()
            .join("default-gzip/2a/ae")
            .join(digest.as_str());
        assert!(on_disk.is_file());
    }

    #[tokio::test]
    async fn test_read_stream_chunks_large_entry() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path()).await;

        let data = vec![7u8; STREAM_CHUNK_SIZE * 3];
        let digest = HashAlgo::Sha1.compute(&data);
        let compressed = compress(Compression::Zlib, &data).await.unwrap();
        backend
            .write_bytes(&digest, Bytes::from(compressed.clone()))
            .await
            .unwrap();

        let mut stream = backend.read_stream(&digest).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, compressed);
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path()).await;
        let digest = HashAlgo::Sha1.compute(b"absent");

        assert!(!backend.contains(&digest).await.unwrap());
        assert!(matches!(
            backend.read(&digest).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            backend.read_stream(&digest).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_length_digest_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path()).await;
        let digest = HashAlgo::Sha256.compute(b"foo");

        assert!(!backend.contains(&digest).await.unwrap());
        let err = backend
            .write_bytes(&digest, Bytes::from_static(b"irrelevant"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidDigest(_)), "{err:?}");
        assert!(std::fs::read_dir(backend.root()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path()).await;
        let digest = HashAlgo::Sha1.compute(b"foo");

        let bad = Bytes::from(compress(Compression::Zlib, b"bar").await.unwrap());
        assert!(backend.write_bytes(&digest, bad).await.is_err());

        let shard = backend.root().join("0b/ee");
        let leftovers: Vec<_> = std::fs::read_dir(&shard).unwrap().collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_namespace_name_must_be_path_safe() {
        let dir = tempfile::tempdir().unwrap();
        let ns = NamespaceSpec::new("../escape", HashAlgo::Sha1, Compression::Zlib);
        assert!(matches!(
            FilesystemBackend::new(dir.path(), ns).await,
            Err(StorageError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path()).await;
        backend.health_check().await.unwrap();
    }
}
