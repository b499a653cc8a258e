use bytes::Bytes;
use hoard_core::{Compression, NamespaceSpec};
use hoard_storage::{ContentStore, FilesystemBackend, MemoryBackend};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::Arc;

/// Compute SHA-1 hash of data as hex string
#[allow(dead_code)]
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Compress data with the namespace's codec.
#[allow(dead_code)]
pub async fn compressed(ns: &NamespaceSpec, data: &[u8]) -> Bytes {
    Bytes::from(hoard_core::compress(ns.compression, data).await.unwrap())
}

/// One store per backend, all serving the default zlib namespace.
#[allow(dead_code)]
pub async fn all_backends(dir: &Path) -> Vec<Arc<dyn ContentStore>> {
    let ns = NamespaceSpec::default();
    assert_eq!(ns.compression, Compression::Zlib);
    vec![
        Arc::new(FilesystemBackend::new(dir, ns.clone()).await.unwrap()),
        Arc::new(MemoryBackend::new(ns)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_hex() {
        assert_eq!(
            sha1_hex(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn test_seeded_bytes_deterministic() {
        assert_eq!(seeded_bytes(42, 1000), seeded_bytes(42, 1000));
        assert_ne!(seeded_bytes(42, 1000), seeded_bytes(43, 1000));
    }
}
