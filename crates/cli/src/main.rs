//! Command-line archiver for hoard.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hoard_client::{
    Archiver, HttpIsolateServer, IsolateServer, ItemFailure, LocalIsolateServer, Stats,
};
use hoard_core::config::{ArchiverConfig, ClientConfig};
use hoard_core::{Compression, HashAlgo, HexDigest};
use hoard_storage::FilesystemBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hoard")]
#[command(about = "Archive files into hoard content-addressed storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct TargetArgs {
    /// Client config file path
    #[arg(long, env = "HOARD_CLIENT_CONFIG")]
    client_config: Option<PathBuf>,

    /// Server URL (overrides client config)
    #[arg(long)]
    server: Option<String>,

    /// Use a local storage directory instead of a server
    #[arg(long, conflicts_with = "server")]
    store_dir: Option<PathBuf>,

    /// Namespace name (overrides client config)
    #[arg(long)]
    namespace: Option<String>,

    /// Hash algorithm of the namespace: sha-1 or sha-256
    #[arg(long)]
    digest_hash: Option<HashAlgo>,

    /// Compression of the namespace: flate, zlib or "" for none
    #[arg(long)]
    compression: Option<Compression>,

    /// Bearer token (overrides client config)
    #[arg(long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash, deduplicate and upload files
    Archive {
        /// Files to archive
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Download an entry and verify it against its digest
    Fetch {
        /// Hex digest of the content
        digest: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show the server version
    Details {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Where content goes: a remote server or a local store.
enum Target {
    Http(HttpIsolateServer),
    Local(LocalIsolateServer),
}

impl Target {
    fn server(&self) -> Arc<dyn IsolateServer> {
        match self {
            Self::Http(server) => Arc::new(server.clone()),
            Self::Local(server) => Arc::new(server.clone()),
        }
    }

    async fn fetch(&self, digest: &HexDigest) -> Result<Vec<u8>> {
        let content = match self {
            Self::Http(server) => server.fetch(digest).await?,
            Self::Local(server) => server.fetch(digest).await?,
        };
        Ok(content)
    }
}

impl TargetArgs {
    fn config(&self) -> Result<ClientConfig> {
        let mut config = config::load(self.client_config.as_deref())?;
        if let Some(server) = &self.server {
            config.server = Some(server.clone());
        }
        if let Some(namespace) = &self.namespace {
            config.namespace.namespace = namespace.clone();
        }
        if let Some(digest_hash) = self.digest_hash {
            config.namespace.digest_hash = digest_hash;
        }
        if let Some(compression) = self.compression {
            config.namespace.compression = compression;
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid client configuration")?;
        Ok(config)
    }

    async fn connect(&self, config: &ClientConfig) -> Result<Target> {
        if let Some(dir) = &self.store_dir {
            let store = FilesystemBackend::new(dir, config.namespace.clone())
                .await
                .with_context(|| format!("failed to open store at {}", dir.display()))?;
            return Ok(Target::Local(LocalIsolateServer::new(Arc::new(store))));
        }
        let server = HttpIsolateServer::from_config(config)
            .context("no usable server: pass --server, --store-dir or set it in the client config")?;
        Ok(Target::Http(server))
    }
}

/// Cancel `token` on Ctrl-C so in-flight items finish and the rest are
/// reported as failures.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupted, cancelling remaining items");
                token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt signal"),
        }
    });
}

/// Run every file through a new archiver and return its stats and failures.
async fn archive_files(
    server: Arc<dyn IsolateServer>,
    config: ArchiverConfig,
    files: Vec<PathBuf>,
    cancel: CancellationToken,
) -> Result<(Stats, Vec<ItemFailure>)> {
    let mut archiver = Archiver::builder(server)
        .config(config)
        .cancellation_token(cancel)
        .start()?;
    for file in files {
        archiver.push_file(file).await?;
    }
    let failures = archiver.close().await;
    Ok((archiver.stats(), failures))
}

async fn archive(files: Vec<PathBuf>, target: TargetArgs) -> Result<()> {
    let config = target.config()?;
    let server = target.connect(&config).await?.server();

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    let (stats, failures) =
        archive_files(server, config.archiver.clone(), files, cancel).await?;

    println!("{stats}");
    for failure in &failures {
        eprintln!("failed: {failure}");
    }
    if !failures.is_empty() {
        anyhow::bail!("{} file(s) could not be archived", failures.len());
    }
    Ok(())
}

async fn fetch(digest: String, output: Option<PathBuf>, target: TargetArgs) -> Result<()> {
    let config = target.config()?;
    let digest = HexDigest::parse(&digest, config.namespace.digest_hash)?;
    let content = target.connect(&config).await?.fetch(&digest).await?;

    match output {
        Some(path) => tokio::fs::write(&path, &content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

async fn details(target: TargetArgs) -> Result<()> {
    let config = target.config()?;
    let details = target
        .connect(&config)
        .await?
        .server()
        .server_capabilities()
        .await?;
    println!("{}", details.server_version);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Archive { files, target } => archive(files, target).await,
        Commands::Fetch {
            digest,
            output,
            target,
        } => fetch(digest, output, target).await,
        Commands::Details { target } => details(target).await,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use hoard_client::{ClientError, Stage};
    use hoard_core::NamespaceSpec;
    use hoard_storage::MemoryBackend;

    fn local_server() -> (Arc<MemoryBackend>, Arc<dyn IsolateServer>) {
        let store = Arc::new(MemoryBackend::new(NamespaceSpec::default()));
        let server = Arc::new(LocalIsolateServer::new(store.clone()));
        (store, server)
    }

    #[tokio::test]
    async fn interrupted_archive_reports_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..3)
            .map(|n| {
                let path = dir.path().join(format!("file-{n}"));
                std::fs::write(&path, format!("content {n}")).unwrap();
                path
            })
            .collect();
        let (store, server) = local_server();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (stats, failures) =
            archive_files(server, ArchiverConfig::default(), files.clone(), cancel)
                .await
                .unwrap();

        assert_eq!(failures.len(), files.len());
        assert!(failures.iter().all(|f| f.stage == Stage::Hash));
        assert!(failures.iter().all(|f| matches!(*f.error, ClientError::Cancelled)));
        assert!(stats.pushed.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn uninterrupted_archive_stores_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo");
        std::fs::write(&path, b"foo").unwrap();
        let (store, server) = local_server();

        let (stats, failures) = archive_files(
            server,
            ArchiverConfig::default(),
            vec![path],
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(stats.misses.len(), 1);
        assert_eq!(store.len().await, 1);
    }
}
