//! Application state shared across handlers.

use crate::auth::{self, Authenticator};
use crate::error::{ApiError, ApiResult};
use hoard_core::NamespaceSpec;
use hoard_core::config::AppConfig;
use hoard_storage::{ContentStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// One content store per configured namespace, keyed by name.
    pub stores: Arc<HashMap<String, Arc<dyn ContentStore>>>,
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Create state from already-built stores.
    pub fn new(
        config: AppConfig,
        stores: impl IntoIterator<Item = Arc<dyn ContentStore>>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let stores = stores
            .into_iter()
            .map(|store| (store.namespace().namespace.clone(), store))
            .collect();
        Self {
            config: Arc::new(config),
            stores: Arc::new(stores),
            authenticator,
        }
    }

    /// Validate `config` and open a store for each of its namespaces.
    pub async fn from_config(config: AppConfig) -> StorageResult<Self> {
        config.validate().map_err(StorageError::Config)?;
        let mut stores = Vec::with_capacity(config.namespaces.len());
        for namespace in &config.namespaces {
            stores.push(hoard_storage::from_config(&config.storage, namespace).await?);
        }
        let authenticator = auth::from_config(&config.auth);
        Ok(Self::new(config, stores, authenticator))
    }

    /// Look up the store serving the namespace called `name`.
    pub fn store(&self, name: &str) -> ApiResult<&Arc<dyn ContentStore>> {
        self.stores
            .get(name)
            .ok_or_else(|| ApiError::NotFound(format!("unknown namespace: {name}")))
    }

    /// Look up the store for `spec`, requiring its hash and compression to
    /// match the configured ones.
    pub fn store_for(&self, spec: &NamespaceSpec) -> ApiResult<&Arc<dyn ContentStore>> {
        let store = self
            .stores
            .get(&spec.namespace)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown namespace: {}", spec.namespace)))?;
        let configured = store.namespace();
        if configured.digest_hash != spec.digest_hash || configured.compression != spec.compression
        {
            return Err(ApiError::BadRequest(format!(
                "namespace {} uses {} with compression {:?}",
                configured.namespace,
                configured.digest_hash,
                configured.compression.as_str()
            )));
        }
        Ok(store)
    }
}
