//! Store backends.
//!
//! The [`CacheStore`] trait is the only thing the cache core depends on.
//! Two backends ship with the crate:
//!
//! - [`MemoryStore`]: in-process map with lazy TTL expiry (the default)
//! - [`LmdbStore`]: file-backed LMDB environment
//!
//! Other backends (remote key-value services, etc.) implement [`CacheStore`]
//! and are plugged in through a [`StoreRegistry`] or handed to the cache as a
//! ready instance.

pub mod lmdb_backend;
pub mod memory;
pub mod registry;
pub mod traits;

pub use lmdb_backend::{LmdbStore, LmdbStoreError, LMDB_STORE_NAME};
pub use memory::{MemoryStore, MEMORY_STORE_NAME};
pub use registry::{StoreFactory, StoreRegistry};
pub use traits::CacheStore;
