//! Archiver and HTTP client against a real hoard server.

mod common;

use common::fixtures::{can_bind_localhost, sha1, write_file};
use hoard_client::{Archiver, HttpIsolateServer, IsolateServer};
use hoard_core::NamespaceSpec;
use hoard_core::config::{AppConfig, ArchiverConfig};
use hoard_server::{AppState, create_router};
use std::sync::Arc;
use tempfile::tempdir;

/// Serve a fresh in-memory hoard server on a random port.
async fn spawn_server(config: AppConfig) -> String {
    let state = AppState::from_config(config).await.unwrap();
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn archive_and_fetch_over_http() {
    if !can_bind_localhost() {
        eprintln!("Skipping end-to-end tests: cannot bind to localhost");
        return;
    }
    let url = spawn_server(AppConfig::for_testing()).await;
    let dir = tempdir().unwrap();
    let foo = write_file(dir.path(), "foo", b"foo");
    let bar = write_file(dir.path(), "bar", b"bar");

    let client = Arc::new(HttpIsolateServer::new(&url, NamespaceSpec::default()).unwrap());
    let details = client.server_capabilities().await.unwrap();
    assert!(details.server_version.starts_with("hoard-"));

    let mut archiver = Archiver::new(client.clone(), ArchiverConfig::default()).unwrap();
    archiver.push_file(&foo).await.unwrap();
    archiver.push_file(&bar).await.unwrap();
    assert!(archiver.close().await.is_empty());
    let stats = archiver.stats();
    assert_eq!((stats.hits.len(), stats.misses.len()), (0, 2));
    assert_eq!(stats.pushed.len(), 2);

    assert_eq!(client.fetch(&sha1(b"foo")).await.unwrap(), b"foo");
    assert_eq!(client.fetch(&sha1(b"bar")).await.unwrap(), b"bar");

    let mut archiver = Archiver::new(client, ArchiverConfig::default()).unwrap();
    archiver.push_file(&foo).await.unwrap();
    archiver.push_file(&bar).await.unwrap();
    assert!(archiver.close().await.is_empty());
    let stats = archiver.stats();
    assert_eq!((stats.hits.len(), stats.misses.len()), (2, 0));
    assert!(stats.pushed.is_empty());
}

#[tokio::test]
async fn token_is_required_when_configured() {
    if !can_bind_localhost() {
        eprintln!("Skipping end-to-end tests: cannot bind to localhost");
        return;
    }
    let mut config = AppConfig::for_testing();
    config.auth.token_hashes = vec![hoard_server::auth::hash_token("s3cret")];
    let url = spawn_server(config).await;

    let anonymous = HttpIsolateServer::new(&url, NamespaceSpec::default()).unwrap();
    let err = anonymous.server_capabilities().await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    let authorized = anonymous.with_token("s3cret");
    assert!(authorized.server_capabilities().await.is_ok());
}
