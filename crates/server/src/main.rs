//! Hoard server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use hoard_core::config::AppConfig;
use hoard_server::{AppState, create_router};
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// hoardd - content-addressed storage server
#[derive(Parser, Debug)]
#[command(name = "hoardd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "HOARD_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration from an optional TOML file overlaid with `HOARD_*`
/// environment variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path.display(),
            "No config file found, using defaults and environment"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("HOARD_").ignore(&["config"]).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("hoardd v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(Path::new(&args.config))?;
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    let state = AppState::from_config(config)
        .await
        .context("failed to initialize storage")?;

    // Verify every backend before accepting requests.
    for (name, store) in state.stores.iter() {
        store
            .health_check()
            .await
            .with_context(|| format!("storage health check failed for namespace {name}"))?;
        tracing::info!(
            namespace = %name,
            backend = store.backend_name(),
            hash = %store.namespace().digest_hash,
            "Namespace ready"
        );
    }
    if !state.config.auth.is_enabled() {
        tracing::warn!("No token hashes configured, accepting anonymous requests");
    }

    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
