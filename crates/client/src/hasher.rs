//! Resolving a local file to its content digest.

use crate::error::ClientResult;
use async_trait::async_trait;
use hoard_core::{DigestItem, HashAlgo};
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Computes the digest of a file.
///
/// The archiver only needs "path in, digest out"; implementations may
/// consult a cache instead of reading the file.
#[async_trait]
pub trait FileHasher: Send + Sync + 'static {
    async fn hash_file(&self, path: &Path) -> ClientResult<DigestItem>;
}

/// Reads the whole file and hashes it incrementally.
#[derive(Clone, Copy, Debug)]
pub struct StreamingHasher {
    algo: HashAlgo,
}

impl StreamingHasher {
    pub fn new(algo: HashAlgo) -> Self {
        Self { algo }
    }
}

#[async_trait]
impl FileHasher for StreamingHasher {
    async fn hash_file(&self, path: &Path) -> ClientResult<DigestItem> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = self.algo.hasher();
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut size: i64 = 0;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as i64;
        }
        Ok(DigestItem::new(hasher.finalize(), size))
    }
}
