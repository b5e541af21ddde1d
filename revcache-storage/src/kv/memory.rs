//! In-memory backing store.

use std::collections::HashMap;
use std::sync::RwLock;

use revcache_core::{StoreError, StoreResult};

use super::traits::{KvStats, KvStore};

/// Process-local key-value store.
///
/// Useful for tests and for embedding a cache without an external service.
/// Nothing is evicted; the store grows until `flush_all`.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    stats: RwLock<KvStats>,
}

impl InMemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get count of stored keys.
    pub fn len(&self) -> StoreResult<usize> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn bump(&self, update: impl FnOnce(&mut KvStats)) -> StoreResult<()> {
        let mut stats = self.stats.write().map_err(|_| StoreError::LockPoisoned)?;
        update(&mut stats);
        Ok(())
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let value = {
            let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
            entries.get(key).cloned()
        };
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
        {
            let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
            entries.insert(key.to_string(), value.to_vec());
        }
        self.bump(|s| s.sets += 1)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed = {
            let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
            entries.remove(key).is_some()
        };
        if removed {
            self.bump(|s| s.deletes += 1)?;
        }
        Ok(removed)
    }

    fn flush_all(&self) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.clear();
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.keys().cloned().collect())
    }

    fn items(&self) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn stats(&self) -> StoreResult<KvStats> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut stats = self
            .stats
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .clone();
        stats.total_items = entries.len() as u64;
        stats.total_bytes = entries.values().map(|v| v.len() as u64).sum();
        Ok(stats)
    }
}
