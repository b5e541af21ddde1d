//! LMDB-backed key-value store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to give the cache a
//! persistent, memory-mapped backing store. Unlike the in-memory store it
//! survives a process restart, so the persisted last-known TID and the
//! current slots can be recovered on a cold start.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`, `keys`, `items` and `stats`
//! - Write transactions for `set`, `delete` and `flush_all`
//! - Statistics are tracked under a `RwLock`

use std::path::Path;
use std::sync::RwLock;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use revcache_core::{StoreError, StoreResult};

use super::traits::{KvStats, KvStore};

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

/// Convert LmdbStoreError to StoreError.
impl From<LmdbStoreError> for StoreError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::EnvOpen(reason) => StoreError::Unavailable { reason },
            LmdbStoreError::Io(e) => StoreError::Unavailable {
                reason: e.to_string(),
            },
            LmdbStoreError::DbOpen(reason) => StoreError::Backend {
                operation: "open",
                reason,
            },
            LmdbStoreError::Transaction(reason) => StoreError::Backend {
                operation: "transaction",
                reason,
            },
        }
    }
}

fn txn_error(e: heed::Error) -> StoreError {
    LmdbStoreError::Transaction(e.to_string()).into()
}

/// LMDB-backed key-value store.
///
/// # Example
///
/// ```ignore
/// use revcache_storage::{LmdbKvStore, RevisionCache};
/// use revcache_core::CacheConfig;
///
/// let store = LmdbKvStore::new("/var/cache/revcache", 256)?;
/// let cache = RevisionCache::new(store, CacheConfig::default())?;
/// ```
pub struct LmdbKvStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Str, Bytes>,
    /// Operation counters.
    stats: RwLock<KvStats>,
}

impl LmdbKvStore {
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
    /// - The directory cannot be created
    /// - `max_size_mb` does not fit in the address space as a byte count
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| LmdbStoreError::EnvOpen(format!("map size of {max_size_mb} MB overflows")))?;

        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process and
        // the memory map is never accessed outside heed's transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB store");

        Ok(Self {
            env,
            db,
            stats: RwLock::new(KvStats::default()),
        })
    }

    fn bump(&self, update: impl FnOnce(&mut KvStats)) -> StoreResult<()> {
        let mut stats = self.stats.write().map_err(|_| StoreError::LockPoisoned)?;
        update(&mut stats);
        Ok(())
    }
}

impl KvStore for LmdbKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let value = self
            .db
            .get(&rtxn, key)
            .map_err(txn_error)?
            .map(|bytes| bytes.to_vec());

        self.bump(|s| {
            if value.is_some() {
                s.get_hits += 1;
            } else {
                s.get_misses += 1;
            }
        })?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.put(&mut wtxn, key, value).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        self.bump(|s| s.sets += 1)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let deleted = self.db.delete(&mut wtxn, key).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        if deleted {
            self.bump(|s| s.deletes += 1)?;
        }
        Ok(deleted)
    }

    fn flush_all(&self) -> StoreResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.clear(&mut wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let mut keys = Vec::new();
        for result in self.db.iter(&rtxn).map_err(txn_error)? {
            let (key, _) = result.map_err(txn_error)?;
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    fn items(&self) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let mut items = Vec::new();
        for result in self.db.iter(&rtxn).map_err(txn_error)? {
            let (key, value) = result.map_err(txn_error)?;
            items.push((key.to_string(), value.to_vec()));
        }
        Ok(items)
    }

    fn stats(&self) -> StoreResult<KvStats> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let total_items = self.db.len(&rtxn).map_err(txn_error)?;
        let mut total_bytes = 0u64;
        for result in self.db.iter(&rtxn).map_err(txn_error)? {
            let (_, value) = result.map_err(txn_error)?;
            total_bytes += value.len() as u64;
        }

        let mut stats = self
            .stats
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .clone();
        stats.total_items = total_items;
        stats.total_bytes = total_bytes;
        Ok(stats)
    }

    fn close(&self) -> StoreResult<()> {
        self.env.force_sync().map_err(txn_error)
    }
}
