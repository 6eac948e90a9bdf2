//! Named store adapters.
//!
//! A [`StoreRegistry`] maps backend names to factories. A [`StoreConfig`] is
//! resolved through the registry exactly once, when a cache is constructed,
//! so the cache core never names a concrete backend type.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use wrapcache_core::{ConfigError, StoreConfig, DEFAULT_LMDB_MAP_SIZE_MB};

use super::lmdb_backend::{LmdbStore, LMDB_STORE_NAME};
use super::memory::{MemoryStore, MEMORY_STORE_NAME};
use super::traits::CacheStore;

/// Factory building a store from its options.
pub type StoreFactory =
    Arc<dyn Fn(&Value) -> Result<Arc<dyn CacheStore>, ConfigError> + Send + Sync>;

/// Options accepted by the `lmdb` factory.
#[derive(Debug, Deserialize)]
struct LmdbOptions {
    path: PathBuf,
    #[serde(default = "default_map_size")]
    max_size_mb: usize,
}

fn default_map_size() -> usize {
    DEFAULT_LMDB_MAP_SIZE_MB
}

fn memory_factory(_options: &Value) -> Result<Arc<dyn CacheStore>, ConfigError> {
    Ok(Arc::new(MemoryStore::new()))
}

fn lmdb_factory(options: &Value) -> Result<Arc<dyn CacheStore>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidOptions {
        store: LMDB_STORE_NAME.to_string(),
        reason,
    };

    let options = LmdbOptions::deserialize(options).map_err(|e| invalid(e.to_string()))?;
    let store =
        LmdbStore::open(&options.path, options.max_size_mb).map_err(|e| invalid(e.to_string()))?;
    Ok(Arc::new(store))
}

/// Registry of named store backends.
#[derive(Clone)]
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in `memory` and `lmdb` backends.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(MEMORY_STORE_NAME, memory_factory);
        registry.register(LMDB_STORE_NAME, lmdb_factory);
        registry
    }

    /// Register (or replace) the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Arc<dyn CacheStore>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register a pre-constructed instance under `name`.
    ///
    /// Every resolution of `name` hands out the same shared instance.
    pub fn register_instance(
        &mut self,
        name: impl Into<String>,
        store: Arc<dyn CacheStore>,
    ) -> &mut Self {
        self.register(name, move |_options: &Value| Ok(Arc::clone(&store)))
    }

    /// Returns true if a backend is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the backend registered under `name`.
    pub fn create(&self, name: &str, options: &Value) -> Result<Arc<dyn CacheStore>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStore {
                name: name.to_string(),
            })?;
        factory(options)
    }

    /// Build the backend selected by `config`.
    ///
    /// The selection is validated first, so options reach the factory
    /// exactly as configured.
    pub fn resolve(&self, config: &StoreConfig) -> Result<Arc<dyn CacheStore>, ConfigError> {
        config.validate()?;
        self.create(config.backend_name(), &config.options())
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
