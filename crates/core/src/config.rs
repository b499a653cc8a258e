//! Configuration types shared across crates.

use crate::namespace::NamespaceSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes. Inline pushes carry base64 content,
    /// so this bounds the largest file that can be stored inline.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Version string reported by `server_details`.
    #[serde(default = "default_server_version")]
    pub server_version: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_body_size() -> usize {
    512 * 1024 * 1024
}

fn default_server_version() -> String {
    format!("hoard-{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_size: default_max_body_size(),
            server_version: default_server_version(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bind.trim().is_empty() {
            return Err("server.bind cannot be empty".to_string());
        }
        if self.max_body_size == 0 {
            return Err("server.max_body_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage. Each namespace gets a subdirectory.
        path: PathBuf,
    },
    /// In-memory storage, lost on restart.
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("storage.path cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Bearer token authentication.
///
/// With no token hashes configured every request is accepted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SHA-256 hex hashes of accepted bearer tokens.
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    #[serde(default)]
    pub token_hashes: Vec<String>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        for hash in &self.token_hashes {
            let ok = hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit());
            if !ok {
                return Err(format!(
                    "auth.token_hashes entries must be 64 hex characters, got {:?}",
                    hash
                ));
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        !self.token_hashes.is_empty()
    }
}

/// Archiver pipeline tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Files hashed concurrently.
    #[serde(default = "default_hash_concurrency")]
    pub hash_concurrency: usize,
    /// Existence-check batches in flight.
    #[serde(default = "default_contains_concurrency")]
    pub contains_concurrency: usize,
    /// Files uploaded concurrently.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
    /// Debounce delay before an existence-check batch is flushed.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Capacity of each stage queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_hash_concurrency() -> usize {
    5
}

fn default_contains_concurrency() -> usize {
    16
}

fn default_upload_concurrency() -> usize {
    8
}

fn default_batch_delay_ms() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    10240
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            hash_concurrency: default_hash_concurrency(),
            contains_concurrency: default_contains_concurrency(),
            upload_concurrency: default_upload_concurrency(),
            batch_delay_ms: default_batch_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ArchiverConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        let limits = [
            ("hash_concurrency", self.hash_concurrency),
            ("contains_concurrency", self.contains_concurrency),
            ("upload_concurrency", self.upload_concurrency),
            ("queue_capacity", self.queue_capacity),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(format!("archiver.{name} must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// Client-side configuration (loaded by the `hoard` binary).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the isolate server.
    pub server: Option<String>,
    /// Namespace to archive into.
    #[serde(default)]
    pub namespace: NamespaceSpec,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// TCP connect timeout. Unset means the HTTP client's default.
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub archiver: ArchiverConfig,
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.namespace.validate().map_err(|e| e.to_string())?;
        self.archiver.validate()
    }
}

fn default_namespaces() -> Vec<NamespaceSpec> {
    vec![NamespaceSpec::default()]
}

/// Complete server application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Namespaces served. Requests for other namespaces are rejected.
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<NamespaceSpec>,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            namespaces: default_namespaces(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** Uses in-memory storage, the default namespace
    /// and no authentication.
    pub fn for_testing() -> Self {
        Self {
            storage: StorageConfig::Memory,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.auth.validate()?;
        if self.namespaces.is_empty() {
            return Err("at least one namespace must be configured".to_string());
        }
        let mut seen = HashSet::new();
        for ns in &self.namespaces {
            ns.validate().map_err(|e| e.to_string())?;
            if !seen.insert(ns.namespace.as_str()) {
                return Err(format!("duplicate namespace {:?}", ns.namespace));
            }
        }
        Ok(())
    }

    /// Look up a configured namespace by name.
    pub fn namespace(&self, name: &str) -> Option<&NamespaceSpec> {
        self.namespaces.iter().find(|ns| ns.namespace == name)
    }
}
