//! Client side of the hoard isolate protocol.
//!
//! This crate provides:
//! - The [`IsolateServer`] abstraction with HTTP and in-process implementations
//! - The [`Archiver`] pipeline that hashes, deduplicates and uploads files
//! - Per-run statistics

pub mod archiver;
pub mod error;
pub mod hasher;
pub mod http;
pub mod local;
pub mod server;
pub mod stats;

pub use archiver::{Archiver, ArchiverBuilder, ItemFailure, Stage};
pub use error::{ClientError, ClientResult};
pub use hasher::{FileHasher, StreamingHasher};
pub use http::HttpIsolateServer;
pub use local::LocalIsolateServer;
pub use server::{ContentSource, IsolateServer, PushState};
pub use stats::{Stats, UploadStat};
