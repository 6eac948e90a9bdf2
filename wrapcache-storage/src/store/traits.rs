//! Store backend trait.
//!
//! This module defines the contract every store backend implements. The cache
//! core talks to backends only through [`CacheStore`] and never depends on a
//! concrete backend type.

use std::time::Duration;

use async_trait::async_trait;
use wrapcache_core::{CacheKey, StoreError, StoreResult};

/// Cache store trait for pluggable key-value backends.
///
/// Values are opaque byte payloads; encoding is the caller's concern.
/// Implementations must be thread-safe and support concurrent access.
///
/// # Semantics
///
/// - `get` returns `Ok(None)` for absent *and* expired keys. Errors are
///   reserved for backend malfunction (I/O, corrupt records).
/// - `set` overwrites silently.
/// - `delete` is idempotent; deleting an absent key is not an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Registry name of this backend, used in logs and errors.
    fn name(&self) -> &str;

    /// Get the payload stored under `key`, if present and not expired.
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`. `ttl` of `None` means no expiry.
    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove `key` if present.
    async fn delete(&self, key: &CacheKey) -> StoreResult<()>;

    /// Remove every entry and return how many were removed.
    ///
    /// Backends that cannot enumerate their contents keep the default, which
    /// reports the operation as unsupported.
    async fn clear(&self) -> StoreResult<u64> {
        Err(StoreError::Unsupported {
            store: self.name().to_string(),
            operation: "clear".to_string(),
        })
    }
}
