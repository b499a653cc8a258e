//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hoard_core::config::{AppConfig, StorageConfig};
use hoard_core::{Compression, HashAlgo, NamespaceSpec};
use hoard_server::{AppState, create_router};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const API: &str = "/_ah/api/isolateservice/v1";

/// A test server over filesystem storage in a temp directory.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Serve `default-gzip` (sha-1, zlib) and `raw` (sha-256, identity).
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: temp_dir.path().join("storage"),
        };
        config.namespaces = vec![
            NamespaceSpec::default(),
            NamespaceSpec::new("raw", HashAlgo::Sha256, Compression::Identity),
        ];
        modifier(&mut config);

        let state = AppState::from_config(config)
            .await
            .expect("Failed to create state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// POST a JSON body to an isolate endpoint.
    pub async fn post(&self, endpoint: &str, body: &Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("{API}/{endpoint}"))
            .header("Content-Type", "application/json; charset=utf-8");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = builder
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// GET a path, returning the raw body.
    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }
}
