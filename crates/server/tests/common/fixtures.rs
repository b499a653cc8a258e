//! Test data helpers.

use hoard_core::{HashAlgo, HexDigest, NamespaceSpec};

#[allow(dead_code)]
pub const FOO_SHA1: &str = "0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33";

#[allow(dead_code)]
pub fn sha1(data: &[u8]) -> HexDigest {
    HashAlgo::Sha1.compute(data)
}

/// Compress `data` the way clients of the default namespace do.
#[allow(dead_code)]
pub async fn deflate(data: &[u8]) -> Vec<u8> {
    hoard_core::compress(NamespaceSpec::default().compression, data)
        .await
        .unwrap()
}

#[allow(dead_code)]
pub fn ticket(namespace: &str, digest: &HexDigest) -> String {
    hoard_core::UploadTicket::new(namespace, digest.clone()).to_string()
}
