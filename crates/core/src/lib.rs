//! Core domain types shared by the hoard client and server.
//!
//! This crate defines:
//! - Content digests and incremental hashing
//! - Namespace specifications (hash algorithm + compression)
//! - zlib compression and incremental decompression
//! - Wire types of the isolate protocol
//! - Configuration

pub mod compression;
pub mod config;
pub mod digest;
pub mod error;
pub mod namespace;
pub mod protocol;

pub use compression::{Decompressor, compress, compress_reader, decompress};
pub use digest::{DigestHasher, DigestItem, HashAlgo, HexDigest};
pub use error::{Error, Result};
pub use namespace::{Compression, NamespaceSpec};
pub use protocol::UploadTicket;
