//! Verifying content-addressed storage for hoard.
//!
//! This crate provides:
//! - The [`ContentStore`] trait: contains / read / verified write per namespace
//! - Streaming decompress-and-hash verification of incoming content
//! - Backends: local filesystem (atomic rename) and in-memory

pub mod backends;
pub mod error;
pub mod traits;
pub mod verify;

pub use backends::{filesystem::FilesystemBackend, memory::MemoryBackend};
pub use error::{StorageError, StorageResult};
pub use traits::{ByteStream, ContentStore, single_chunk};
pub use verify::{DigestVerifier, Verified};

use hoard_core::NamespaceSpec;
use hoard_core::config::StorageConfig;
use std::sync::Arc;

/// Create a content store for `namespace` from configuration.
pub async fn from_config(
    config: &StorageConfig,
    namespace: &NamespaceSpec,
) -> StorageResult<Arc<dyn ContentStore>> {
    config.validate().map_err(StorageError::Config)?;
    namespace
        .validate()
        .map_err(|e| StorageError::Config(e.to_string()))?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path, namespace.clone()).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new(namespace.clone()))),
    }
}
