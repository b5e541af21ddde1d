//! Cache counters and diagnostic dumps.
//!
//! Nothing here keeps state of its own: reports and dumps are read-only
//! views over the engine counters, the backing store and
//! [`RevisionCache::contents`].

use std::fmt::Display;

use chrono::{DateTime, Utc};
use revcache_core::{CacheEntry, CacheResult, Oid, Tid};
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::engine::RevisionCache;
use crate::kv::{KvStats, KvStore};

/// Engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Revisions written by `store` (duplicates excluded).
    pub adds: u64,
    /// Successful `load`/`load_before` lookups.
    pub accesses: u64,
}

/// Engine counters together with backing-store statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatsReport {
    pub cache: CacheStats,
    pub store: KvStats,
    /// Revisions held by the in-memory non-current index.
    pub noncurrent_revisions: usize,
}

/// Identity of one entry in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CurrentEntry {
    #[serde(serialize_with = "as_display")]
    pub oid: Oid,
    #[serde(serialize_with = "as_display")]
    pub tid: Tid,
}

/// One revision of the non-current index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NoncurrentEntry {
    #[serde(serialize_with = "as_display")]
    pub oid: Oid,
    #[serde(serialize_with = "as_display")]
    pub start_tid: Tid,
    #[serde(serialize_with = "as_display")]
    pub end_tid: Tid,
}

/// Point-in-time listing of everything a cache holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheDump {
    pub generated_at: DateTime<Utc>,
    /// Item count reported by the backing store.
    pub size: usize,
    /// Entries in the backing store, sorted.
    pub current: Vec<CurrentEntry>,
    /// Non-current index, sorted.
    pub noncurrent: Vec<NoncurrentEntry>,
}

impl CacheDump {
    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn as_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl<S: KvStore> RevisionCache<S> {
    /// Engine counters plus backing-store statistics.
    pub fn report(&self) -> CacheResult<CacheStatsReport> {
        let state = self.lock()?;
        Ok(CacheStatsReport {
            cache: state.stats,
            store: self.store.stats()?,
            noncurrent_revisions: state.noncurrent.len(),
        })
    }

    /// Emit the current report as a single `info` event.
    pub fn log_stats(&self) -> CacheResult<()> {
        let report = self.report()?;
        info!(
            adds = report.cache.adds,
            accesses = report.cache.accesses,
            noncurrent = report.noncurrent_revisions,
            store_items = report.store.total_items,
            store_bytes = report.store.total_bytes,
            store_hit_rate = report.store.hit_rate(),
            "Cache stats"
        );
        Ok(())
    }

    /// List every current entry and every non-current revision.
    ///
    /// The current listing goes through [`contents`](Self::contents) and so
    /// is only weakly consistent with concurrent writers.
    pub fn dump(&self) -> CacheResult<CacheDump> {
        let size = self.len()?;

        let mut current = self
            .contents()
            .map(|item| item.map(|(oid, tid)| CurrentEntry { oid, tid }))
            .collect::<CacheResult<Vec<_>>>()?;
        current.sort();

        let mut noncurrent = Vec::new();
        {
            let state = self.lock()?;
            for (oid, start_tid, bytes) in state.noncurrent.iter() {
                match CacheEntry::decode(bytes) {
                    Ok(entry) => noncurrent.push(NoncurrentEntry {
                        oid,
                        start_tid,
                        end_tid: entry.end_tid,
                    }),
                    Err(e) => {
                        warn!(oid = %oid, start_tid = %start_tid, error = %e, "Malformed non-current entry");
                    }
                }
            }
        }
        noncurrent.sort();

        Ok(CacheDump {
            generated_at: Utc::now(),
            size,
            current,
            noncurrent,
        })
    }
}
