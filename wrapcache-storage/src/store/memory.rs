//! In-process memory store.
//!
//! Entries live in a `HashMap` behind a `tokio::sync::RwLock`. Expiry is lazy:
//! an expired entry reads as absent and is removed on the next access, or in
//! bulk by [`MemoryStore::purge_expired`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use wrapcache_core::{CacheEntry, CacheKey, StoreResult};

use super::traits::CacheStore;

/// Registry name of the memory backend.
pub const MEMORY_STORE_NAME: &str = "memory";

/// Memory-backed store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    /// Create an empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    /// Returns true if there are no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry and return how many were dropped.
    pub async fn purge_expired(&self) -> u64 {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        (before - entries.len()) as u64
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        MEMORY_STORE_NAME
    }

    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired_at(now) => {
                    return Ok(Some(entry.value().to_vec()))
                }
                Some(_) => {}
            }
        }

        // Expired: remove unless a writer replaced it in the meantime.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let entry = CacheEntry::with_ttl(value, ttl, Utc::now());
        self.entries.write().await.insert(key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }
}
