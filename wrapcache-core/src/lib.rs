//! WRAPCACHE Core - Keys, Entries, Configuration and Errors
//!
//! Pure data types shared by every wrapcache crate. Nothing in here performs
//! I/O; store backends and the wrap-in-cache core live in `wrapcache-storage`.

pub mod config;
pub mod entry;
pub mod error;
pub mod key;

pub use config::{
    CacheConfig, StoreConfig, DEFAULT_LMDB_MAP_SIZE_MB, LMDB_BYTES_PER_MB, MAX_LMDB_MAP_SIZE_MB,
};
pub use entry::{CacheEntry, ENTRY_HEADER_LEN};
pub use error::{CacheError, CacheResult, ConfigError, ProducerError, StoreError, StoreResult};
pub use key::CacheKey;
