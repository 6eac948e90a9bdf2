//! LMDB-backed store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! file-backed key-value store that survives process restarts.
//!
//! # Record Layout
//!
//! Keys are the raw UTF-8 bytes of the [`CacheKey`]. Values use the
//! [`CacheEntry`] record format: an 8-byte expiry header followed by the
//! payload. Expired records read as absent and are deleted on access.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`
//! - Write transactions for `set`, `delete`, `clear` and expiry cleanup

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use wrapcache_core::{CacheEntry, CacheKey, StoreError, StoreResult, LMDB_BYTES_PER_MB};

use super::traits::CacheStore;

/// Registry name of the LMDB backend.
pub const LMDB_STORE_NAME: &str = "lmdb";

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StoreError {
    fn from(e: LmdbStoreError) -> Self {
        StoreError::io(LMDB_STORE_NAME, e)
    }
}

fn txn_err(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// LMDB-backed store.
///
/// # Example
///
/// ```ignore
/// use wrapcache_storage::store::{CacheStore, LmdbStore};
///
/// let store = LmdbStore::open("/tmp/wrapcache", 100)?;
/// store.set(&"user_1".into(), b"alice".to_vec(), None).await?;
/// ```
pub struct LmdbStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Directory holding the LMDB files.
    path: PathBuf,
}

impl LmdbStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_size_mb` is zero or its byte count overflows `usize`
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = max_size_mb
            .checked_mul(LMDB_BYTES_PER_MB)
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                LmdbStoreError::EnvOpen(format!("invalid map size of {max_size_mb} MB"))
            })?;

        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per store and the directory
        // is not opened again by this process through another Env.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Directory holding the LMDB files.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records, expired ones included.
    pub fn record_count(&self) -> Result<u64, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        self.db.len(&rtxn).map_err(txn_err)
    }

    /// Delete `key` if its record is still expired.
    fn remove_if_expired(&self, key: &CacheKey) -> Result<(), LmdbStoreError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let still_expired = self
            .db
            .get(&wtxn, key.as_bytes())
            .map_err(txn_err)?
            .and_then(CacheEntry::decode)
            .is_some_and(|entry| entry.is_expired());
        if still_expired {
            self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_err)?;
        }
        wtxn.commit().map_err(txn_err)
    }
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore").field("path", &self.path).finish()
    }
}

#[async_trait]
impl CacheStore for LmdbStore {
    fn name(&self) -> &str {
        LMDB_STORE_NAME
    }

    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        let entry = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            match self.db.get(&rtxn, key.as_bytes()).map_err(txn_err)? {
                None => return Ok(None),
                Some(bytes) => CacheEntry::decode(bytes)
                    .ok_or_else(|| StoreError::decode(key, "corrupt LMDB record"))?,
            }
        };

        if entry.is_expired_at(Utc::now()) {
            self.remove_if_expired(key)?;
            return Ok(None);
        }
        Ok(Some(entry.into_value()))
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let record = CacheEntry::with_ttl(value, ttl, Utc::now()).encode();

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &record)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> StoreResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    async fn clear(&self) -> StoreResult<u64> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let removed = self.db.len(&wtxn).map_err(txn_err)?;
        self.db.clear(&mut wtxn).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(removed)
    }
}
