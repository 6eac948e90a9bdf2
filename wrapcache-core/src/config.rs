//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default LMDB map size when none is configured.
pub const DEFAULT_LMDB_MAP_SIZE_MB: usize = 256;

/// Bytes per configured megabyte of LMDB map size.
pub const LMDB_BYTES_PER_MB: usize = 1024 * 1024;

/// Largest LMDB map size whose byte count fits in `usize`.
pub const MAX_LMDB_MAP_SIZE_MB: usize = usize::MAX / LMDB_BYTES_PER_MB;

fn default_lmdb_map_size_mb() -> usize {
    DEFAULT_LMDB_MAP_SIZE_MB
}

/// Which store backend a cache should use.
///
/// Selection is by name: `memory` and `lmdb` are built in, anything else is
/// looked up in the store registry under [`StoreConfig::Named`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process map
    #[default]
    Memory,
    /// LMDB environment on local disk
    Lmdb {
        path: PathBuf,
        #[serde(default = "default_lmdb_map_size_mb")]
        max_size_mb: usize,
    },
    /// Any backend registered under `name`; `options` go to its factory as-is
    Named {
        name: String,
        #[serde(default)]
        options: serde_json::Value,
    },
}

impl StoreConfig {
    /// In-process memory backend.
    pub fn memory() -> Self {
        Self::Memory
    }

    /// LMDB backend rooted at `path`.
    pub fn lmdb(path: impl Into<PathBuf>, max_size_mb: usize) -> Self {
        Self::Lmdb {
            path: path.into(),
            max_size_mb,
        }
    }

    /// Backend registered under `name`.
    pub fn named(name: impl Into<String>, options: serde_json::Value) -> Self {
        Self::Named {
            name: name.into(),
            options,
        }
    }

    /// Registry name of the selected backend.
    pub fn backend_name(&self) -> &str {
        match self {
            Self::Memory => "memory",
            Self::Lmdb { .. } => "lmdb",
            Self::Named { name, .. } => name,
        }
    }

    /// Options handed to the backend factory.
    pub fn options(&self) -> serde_json::Value {
        match self {
            Self::Memory => serde_json::Value::Null,
            Self::Lmdb { path, max_size_mb } => serde_json::json!({
                "path": path.to_string_lossy(),
                "max_size_mb": max_size_mb,
            }),
            Self::Named { options, .. } => options.clone(),
        }
    }

    /// Check the backend selection.
    ///
    /// LMDB paths must be valid UTF-8 because backend options travel as JSON.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Memory => Ok(()),
            Self::Lmdb { path, max_size_mb } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "store.path".to_string(),
                        reason: "must not be empty".to_string(),
                    });
                }
                if path.to_str().is_none() {
                    return Err(ConfigError::InvalidValue {
                        field: "store.path".to_string(),
                        reason: format!("must be valid UTF-8: {}", path.display()),
                    });
                }
                if *max_size_mb == 0 || *max_size_mb > MAX_LMDB_MAP_SIZE_MB {
                    return Err(ConfigError::InvalidValue {
                        field: "store.max_size_mb".to_string(),
                        reason: format!("must be between 1 and {MAX_LMDB_MAP_SIZE_MB}"),
                    });
                }
                Ok(())
            }
            Self::Named { name, .. } => {
                if name.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "store.name".to_string(),
                        reason: "must not be empty".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Configuration for a cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Store backend selection.
    pub store: StoreConfig,
    /// TTL applied when a write does not specify one. `None` = no expiry.
    #[serde(rename = "default_ttl_ms", with = "duration_ms")]
    pub default_ttl: Option<Duration>,
    /// Namespace prepended to every key this cache touches.
    pub key_prefix: Option<String>,
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store backend.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Clear the default TTL.
    pub fn without_ttl(mut self) -> Self {
        self.default_ttl = None;
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(prefix) = &self.key_prefix {
            if prefix.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "key_prefix".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        self.store.validate()
    }
}

/// `Option<Duration>` as optional whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(ttl) => s.serialize_some(&(ttl.as_millis().min(u64::MAX as u128) as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
