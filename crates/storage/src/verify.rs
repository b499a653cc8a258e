//! Streaming digest verification for the write path.

use crate::error::{StorageError, StorageResult};
use hoard_core::{Decompressor, DigestHasher, HexDigest, NamespaceSpec};

/// Outcome of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verified {
    /// Size of the compressed content as stored.
    pub stored_size: u64,
    /// Size of the decompressed content.
    pub content_size: u64,
}

/// Decompresses and hashes content one chunk at a time, then checks the
/// result against the claimed digest.
pub struct DigestVerifier {
    expected: HexDigest,
    decompressor: Decompressor,
    hasher: DigestHasher,
    stored_size: u64,
    content_size: u64,
}

impl DigestVerifier {
    pub fn new(namespace: &NamespaceSpec, expected: HexDigest) -> Self {
        Self {
            expected,
            decompressor: Decompressor::new(namespace.compression),
            hasher: namespace.digest_hash.hasher(),
            stored_size: 0,
            content_size: 0,
        }
    }

    /// Feed one compressed chunk.
    pub fn update(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.stored_size += chunk.len() as u64;
        let hasher = &mut self.hasher;
        let content_size = &mut self.content_size;
        self.decompressor.feed(chunk, &mut |out| {
            hasher.update(out);
            *content_size += out.len() as u64;
        })?;
        Ok(())
    }

    /// Finish decompression and compare digests.
    pub fn finish(mut self) -> StorageResult<Verified> {
        let hasher = &mut self.hasher;
        let content_size = &mut self.content_size;
        self.decompressor.finish(&mut |out| {
            hasher.update(out);
            *content_size += out.len() as u64;
        })?;

        let actual = self.hasher.finalize();
        if actual != self.expected {
            return Err(StorageError::DigestMismatch {
                expected: self.expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(Verified {
            stored_size: self.stored_size,
            content_size: self.content_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::{Compression, HashAlgo};

    #[tokio::test]
    async fn verifies_in_small_chunks() {
        let ns = NamespaceSpec::default();
        let data = b"hello world".repeat(1000);
        let compressed = hoard_core::compress(Compression::Zlib, &data).await.unwrap();

        let mut verifier = DigestVerifier::new(&ns, HashAlgo::Sha1.compute(&data));
        for chunk in compressed.chunks(7) {
            verifier.update(chunk).unwrap();
        }
        let verified = verifier.finish().unwrap();
        assert_eq!(verified.content_size, data.len() as u64);
        assert_eq!(verified.stored_size, compressed.len() as u64);
    }

    #[tokio::test]
    async fn verifies_output_larger_than_inflate_buffer() {
        let ns = NamespaceSpec::default();
        let data = vec![b'x'; 2 << 20];
        let compressed = hoard_core::compress(Compression::Zlib, &data).await.unwrap();

        let mut verifier = DigestVerifier::new(&ns, HashAlgo::Sha1.compute(&data));
        for chunk in compressed.chunks(4096) {
            verifier.update(chunk).unwrap();
        }
        assert_eq!(verifier.finish().unwrap().content_size, data.len() as u64);
    }

    #[test]
    fn mismatch_names_both_digests() {
        let ns = NamespaceSpec::new("raw", HashAlgo::Sha1, Compression::Identity);
        let claimed = HashAlgo::Sha1.compute(b"hello world");
        let mut verifier = DigestVerifier::new(&ns, claimed);
        verifier.update(b"other data").unwrap();
        match verifier.finish() {
            Err(StorageError::DigestMismatch { expected, actual }) => {
                assert_eq!(expected, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
                assert_eq!(actual, "ddd9d41363a535aeb9a8178ed03ede5ca69fd438");
            }
            other => panic!("expected DigestMismatch, got {other:?}"),
        }
    }
}
