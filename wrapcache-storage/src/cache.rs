//! Wrap-in-cache core.
//!
//! [`Cache::wrap`] returns the stored value for a key if there is one,
//! otherwise runs the producer, writes its result to the store and returns
//! it. Concurrent misses on one key share a single producer execution.
//!
//! # Ordering
//!
//! A successful production is written to the store *before* its outcome is
//! published to waiters, so anyone who observes the value through `wrap`
//! will also find it with `get`.
//!
//! # Cancellation
//!
//! The producer runs on its own tokio task. Dropping a `wrap` future (the
//! leader's included) never cancels production; followers and the store
//! still receive the outcome. `wrap` must therefore be called from within a
//! tokio runtime.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use wrapcache_core::{
    CacheConfig, CacheError, CacheKey, CacheResult, ProducerError, StoreError,
};

use crate::flight::{Flight, FlightRegistry, LeaderTicket};
use crate::stats::{CacheStats, StatsRecorder};
use crate::store::{CacheStore, StoreRegistry};

/// A cache over a pluggable store with single-flight production.
///
/// # Example
///
/// ```ignore
/// let cache = Cache::from_config(CacheConfig::default())?;
///
/// let user: User = cache
///     .wrap(CacheKey::scoped("user", user_id), move || async move {
///         db.fetch_user(user_id).await.map_err(ProducerError::new)
///     })
///     .await?;
/// ```
pub struct Cache {
    /// The store backend.
    store: Arc<dyn CacheStore>,
    /// In-flight productions of encoded payloads.
    flights: FlightRegistry<Vec<u8>>,
    /// Cache configuration.
    config: CacheConfig,
    /// Wrapped-path counters.
    stats: Arc<StatsRecorder>,
}

impl Cache {
    /// Create a cache over a pre-constructed store.
    ///
    /// `config.store` is ignored; the supplied instance is used as-is.
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            flights: FlightRegistry::new(),
            config,
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    /// Create a cache over a pre-constructed store with default configuration.
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self::new(store, CacheConfig::default())
    }

    /// Create a cache whose store is selected by `config.store` among the
    /// built-in backends.
    pub fn from_config(config: CacheConfig) -> CacheResult<Self> {
        Self::from_config_with_registry(config, &StoreRegistry::with_builtins())
    }

    /// Create a cache whose store is selected by `config.store` in `registry`.
    pub fn from_config_with_registry(
        config: CacheConfig,
        registry: &StoreRegistry,
    ) -> CacheResult<Self> {
        config.validate()?;
        let store = registry.resolve(&config.store)?;
        debug!(store = store.name(), "cache store resolved");
        Ok(Self::new(store, config))
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the store backend.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Snapshot of the wrapped-path counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Number of productions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Apply the configured key prefix.
    fn scoped_key(&self, key: CacheKey) -> CacheKey {
        match &self.config.key_prefix {
            Some(prefix) => key.with_prefix(prefix),
            None => key,
        }
    }

    // ========================================================================
    // DIRECT ACCESS
    // ========================================================================

    /// Read `key` straight from the store.
    ///
    /// Returns `Ok(None)` when the key is absent or expired. Any stored
    /// value counts as present, including `0`, `""`, `false` and `null`.
    pub async fn get<T: DeserializeOwned>(&self, key: impl Into<CacheKey>) -> CacheResult<Option<T>> {
        let key = self.scoped_key(key.into());
        match self.store.get(&key).await? {
            Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Write `value` under `key`, overwriting any existing entry.
    ///
    /// A `ttl` of `None` falls back to the configured default TTL.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey>,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let key = self.scoped_key(key.into());
        let bytes = encode(&key, value)?;
        self.store
            .set(&key, bytes, ttl.or(self.config.default_ttl))
            .await?;
        Ok(())
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub async fn delete(&self, key: impl Into<CacheKey>) -> CacheResult<()> {
        let key = self.scoped_key(key.into());
        self.store.delete(&key).await?;
        Ok(())
    }

    /// Remove every entry from the store.
    ///
    /// Clears the whole backend, not just keys under this cache's prefix.
    pub async fn clear(&self) -> CacheResult<u64> {
        Ok(self.store.clear().await?)
    }

    // ========================================================================
    // WRAPPED ACCESS
    // ========================================================================

    /// Return the cached value for `key`, producing and storing it on a miss.
    ///
    /// - Store read failure: returned immediately, the producer is not run.
    /// - Hit: the stored value, the producer is not run.
    /// - Miss: the producer runs at most once across all concurrent callers
    ///   for `key`. On success its value is written (with the default TTL)
    ///   and then returned to every caller. On failure nothing is written
    ///   and every caller receives the same error.
    pub async fn wrap<T, F, Fut>(&self, key: impl Into<CacheKey>, producer: F) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProducerError>> + Send + 'static,
    {
        self.wrap_with_ttl(key, None, producer).await
    }

    /// Like [`wrap`](Self::wrap), with a TTL for the produced entry.
    ///
    /// A `ttl` of `None` falls back to the configured default TTL.
    pub async fn wrap_with_ttl<T, F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        ttl: Option<Duration>,
        producer: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProducerError>> + Send + 'static,
    {
        let key = self.scoped_key(key.into());

        let cached = match self.store.get(&key).await {
            Ok(cached) => cached,
            Err(err) => {
                self.stats.record_store_failure();
                warn!(key = %key, store = self.store.name(), error = %err, "cache read failed");
                return Err(err.into());
            }
        };

        if let Some(bytes) = cached {
            self.stats.record_hit();
            debug!(key = %key, store = self.store.name(), "cache hit");
            return self.decode_counted(&key, &bytes);
        }
        self.stats.record_miss();

        let waiter = match self.flights.join(&key) {
            Flight::Leader(ticket) => {
                debug!(key = %key, store = self.store.name(), "cache miss, producing");
                let waiter = ticket.subscribe();
                self.spawn_production(ticket, ttl.or(self.config.default_ttl), producer);
                waiter
            }
            Flight::Follower(waiter) => {
                self.stats.record_coalesced();
                debug!(key = %key, store = self.store.name(), "cache miss, joining in-flight production");
                waiter
            }
        };

        let bytes = waiter.wait().await?;
        self.decode_counted(&key, &bytes)
    }

    /// Decode a payload read on the wrapped path, counting failures.
    fn decode_counted<T: DeserializeOwned>(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<T> {
        decode(key, bytes).inspect_err(|err| {
            self.stats.record_store_failure();
            warn!(key = %key, store = self.store.name(), error = %err, "cached value failed to decode");
        })
    }

    /// Run the producer on its own task and complete `ticket` with the outcome.
    fn spawn_production<T, F, Fut>(
        &self,
        ticket: LeaderTicket<Vec<u8>>,
        ttl: Option<Duration>,
        producer: F,
    ) where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProducerError>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let outcome = produce_and_store(store.as_ref(), &stats, ticket.key(), ttl, producer).await;
            ticket.complete(outcome);
        });
    }
}

/// Run the producer and persist its value. Nothing is written on failure.
///
/// The store is read once more first: a burst that finished between the
/// caller's miss and its join has already stored the value.
async fn produce_and_store<T, F, Fut>(
    store: &dyn CacheStore,
    stats: &StatsRecorder,
    key: &CacheKey,
    ttl: Option<Duration>,
    producer: F,
) -> CacheResult<Vec<u8>>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ProducerError>>,
{
    match store.get(key).await {
        Ok(Some(bytes)) => {
            debug!(key = %key, store = store.name(), "value stored by an earlier production");
            return Ok(bytes);
        }
        Ok(None) => {}
        Err(err) => {
            stats.record_store_failure();
            warn!(key = %key, store = store.name(), error = %err, "cache read failed");
            return Err(err.into());
        }
    }

    stats.record_production();

    let value = match producer().await {
        Ok(value) => value,
        Err(err) => {
            stats.record_producer_failure();
            warn!(key = %key, error = %err, "producer failed");
            return Err(CacheError::Producer(err));
        }
    };

    let bytes = match encode(key, &value) {
        Ok(bytes) => bytes,
        Err(err) => {
            stats.record_store_failure();
            warn!(key = %key, error = %err, "produced value failed to encode");
            return Err(err.into());
        }
    };
    if let Err(err) = store.set(key, bytes.clone(), ttl).await {
        stats.record_store_failure();
        warn!(key = %key, store = store.name(), error = %err, "cache write failed");
        return Err(err.into());
    }
    Ok(bytes)
}

fn encode<T: Serialize + ?Sized>(key: &CacheKey, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::encode(key, e))
}

fn decode<T: DeserializeOwned>(key: &CacheKey, bytes: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::decode(key, e).into())
}

impl Clone for Cache {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            flights: self.flights.clone(),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .field("flights", &self.flights)
            .finish()
    }
}
