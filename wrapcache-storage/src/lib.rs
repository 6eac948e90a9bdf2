//! WRAPCACHE Storage - Store Backends and the Wrap-in-Cache Core
//!
//! Layers, leaves first:
//!
//! - [`store`]: the [`CacheStore`] contract, the built-in `memory` and `lmdb`
//!   backends, and the [`StoreRegistry`] that resolves backends by name.
//! - [`flight`]: the single-flight registry deduplicating concurrent
//!   production per key.
//! - [`cache`]: [`Cache`], which orchestrates get, produce, set and return.

pub mod cache;
pub mod flight;
pub mod stats;
pub mod store;

pub use cache::Cache;
pub use flight::{Flight, FlightRegistry, LeaderTicket, Waiter};
pub use stats::CacheStats;
pub use store::{
    CacheStore, LmdbStore, LmdbStoreError, MemoryStore, StoreFactory, StoreRegistry,
};

// Re-export core types so most callers need a single dependency
pub use wrapcache_core::{
    CacheConfig, CacheEntry, CacheError, CacheKey, CacheResult, ConfigError, ProducerError,
    StoreConfig, StoreError, StoreResult,
};
