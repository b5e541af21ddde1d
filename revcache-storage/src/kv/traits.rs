//! Backing key-value store trait and its statistics.
//!
//! The cache engine never talks to a network or a disk directly. It drives
//! one of these stores, which owns transport, eviction and iteration
//! stability.

use std::sync::Arc;

use revcache_core::StoreResult;
use serde::Serialize;

/// Synchronous key-value store backing a revision cache.
///
/// Every call may block (network or disk I/O). Implementations must be
/// thread-safe; the only ordering guarantee the cache relies on is
/// read-your-writes from a single caller.
///
/// # Errors
///
/// Transport failures are reported as [`revcache_core::StoreError`] and are
/// propagated to cache callers unchanged.
pub trait KvStore: Send + Sync {
    /// Get the bytes stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Delete `key`. Returns whether a value was removed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove every key.
    fn flush_all(&self) -> StoreResult<()>;

    /// Snapshot of all keys currently stored, in no particular order.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Snapshot of all key/value pairs.
    ///
    /// The default implementation reads each key in turn, skipping keys that
    /// disappear between the two calls.
    fn items(&self) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let mut items = Vec::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                items.push((key, value));
            }
        }
        Ok(items)
    }

    /// Store statistics.
    fn stats(&self) -> StoreResult<KvStats>;

    /// Release connections or file handles. No other call may follow.
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key)
    }

    fn flush_all(&self) -> StoreResult<()> {
        (**self).flush_all()
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys()
    }

    fn items(&self) -> StoreResult<Vec<(String, Vec<u8>)>> {
        (**self).items()
    }

    fn stats(&self) -> StoreResult<KvStats> {
        (**self).stats()
    }

    fn close(&self) -> StoreResult<()> {
        (**self).close()
    }
}

/// Statistics reported by a backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KvStats {
    /// Number of keys currently stored, reserved keys included.
    pub total_items: u64,
    /// Approximate bytes of stored values.
    pub total_bytes: u64,
    /// Number of `get` calls that found a value.
    pub get_hits: u64,
    /// Number of `get` calls that found nothing.
    pub get_misses: u64,
    /// Number of `set` calls.
    pub sets: u64,
    /// Number of `delete` calls that removed a value.
    pub deletes: u64,
}

impl KvStats {
    /// Calculate the get hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.get_hits + self.get_misses;
        if total == 0 {
            0.0
        } else {
            self.get_hits as f64 / total as f64
        }
    }
}
