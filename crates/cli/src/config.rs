//! Client configuration loading.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hoard_core::config::ClientConfig;
use std::path::Path;

/// Environment prefix for client settings, e.g. `HOARD_CLIENT_SERVER`.
pub const ENV_PREFIX: &str = "HOARD_CLIENT_";

/// Load client configuration: defaults, then the optional TOML file, then
/// `HOARD_CLIENT_*` environment variables.
pub fn load(path: Option<&Path>) -> Result<ClientConfig> {
    let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("client config not found: {}", path.display());
        }
        tracing::debug!(config_path = %path.display(), "Loading client configuration");
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
        .extract()
        .context("failed to load client configuration")
}
