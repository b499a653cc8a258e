use hoard_core::{HashAlgo, HexDigest};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

pub const FOO_SHA1: &str = "0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33";
pub const BAR_SHA1: &str = "62cdb7020ff920e5aa642c3d4066950dd1f01f4d";

#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

#[allow(dead_code)]
pub fn sha1(data: &[u8]) -> HexDigest {
    HashAlgo::Sha1.compute(data)
}

/// Write `content` to `dir/name` and return the path.
#[allow(dead_code)]
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Write `count` distinct files named `file-<n>`.
#[allow(dead_code)]
pub fn write_files(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|n| write_file(dir, &format!("file-{n}"), format!("content {n}").as_bytes()))
        .collect()
}
