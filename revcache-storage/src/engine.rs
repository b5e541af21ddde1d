//! Revision cache engine.
//!
//! Holds the current/non-current state machine on top of a [`KvStore`]. The
//! store carries one current slot per object plus the persisted watermark;
//! superseded revisions live in an in-memory [`NoncurrentIndex`].
//!
//! # Locking
//!
//! One mutex per engine guards the watermark, the counters and the
//! non-current index, and is held across the backing-store calls of every
//! operation. A slow store therefore stalls every caller of the same engine.
//! Shard objects across several engines when that matters.

use std::sync::{Mutex, MutexGuard};

use revcache_core::{
    encode_parts, is_entry_key, to_key, CacheConfig, CacheEntry, CacheError, CacheResult, Oid,
    StoreError, Tid,
};
use tracing::{debug, warn};

use crate::kv::KvStore;
use crate::noncurrent::NoncurrentIndex;
use crate::stats::CacheStats;

/// State guarded by the engine lock.
#[derive(Debug)]
pub(crate) struct EngineState {
    pub(crate) last_tid: Option<Tid>,
    pub(crate) stats: CacheStats,
    pub(crate) noncurrent: NoncurrentIndex,
}

/// MVCC client cache over a backing key-value store.
///
/// # Example
///
/// ```ignore
/// use revcache_core::{CacheConfig, Oid, Tid};
/// use revcache_storage::{InMemoryKvStore, RevisionCache};
///
/// let cache = RevisionCache::new(InMemoryKvStore::new(), CacheConfig::default())?;
/// cache.store(Oid::new(1), Tid::new(10), None, b"A")?;
/// assert_eq!(cache.load(Oid::new(1))?, Some((b"A".to_vec(), Tid::new(10))));
/// ```
pub struct RevisionCache<S: KvStore> {
    pub(crate) store: S,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) config: CacheConfig,
}

impl<S: KvStore> RevisionCache<S> {
    /// Build a cache over `store`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if `config` does not validate.
    pub fn new(store: S, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let state = EngineState {
            last_tid: None,
            stats: CacheStats::default(),
            noncurrent: NoncurrentIndex::new(config.retention),
        };
        Ok(Self {
            store,
            state: Mutex::new(state),
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The backing store.
    pub fn backing_store(&self) -> &S {
        &self.store
    }

    pub(crate) fn lock(&self) -> CacheResult<MutexGuard<'_, EngineState>> {
        self.state
            .lock()
            .map_err(|_| CacheError::Store(StoreError::LockPoisoned))
    }

    // ========================================================================
    // WATERMARK
    // ========================================================================

    /// Advance the last-known TID.
    ///
    /// On a non-empty cache with a known watermark, `tid` must be strictly
    /// greater than it.
    ///
    /// # Errors
    ///
    /// `CacheError::OrderingViolation` if `tid` does not advance the
    /// watermark. Store failures propagate and leave the watermark unchanged.
    pub fn set_last_tid(&self, tid: Tid) -> CacheResult<()> {
        let mut state = self.lock()?;
        self.advance_watermark(&mut state, tid, "set_last_tid")
    }

    fn advance_watermark(
        &self,
        state: &mut EngineState,
        tid: Tid,
        operation: &'static str,
    ) -> CacheResult<()> {
        if let Some(last) = state.last_tid {
            if tid <= last && !self.store_is_empty()? {
                warn!(operation, tid = %tid, last = %last, "Rejected non-increasing tid");
                return Err(CacheError::OrderingViolation {
                    operation,
                    attempted: tid,
                    last,
                });
            }
        }

        self.store.set(&self.config.last_tid_key, &tid.to_bytes())?;
        state.last_tid = Some(tid);
        debug!(operation, tid = %tid, "Advanced last tid");
        Ok(())
    }

    /// The last-known TID: the in-memory value, else the one persisted in the
    /// backing store by an earlier process, else `None`.
    pub fn get_last_tid(&self) -> CacheResult<Option<Tid>> {
        let state = self.lock()?;
        if let Some(tid) = state.last_tid {
            return Ok(Some(tid));
        }

        let Some(raw) = self.store.get(&self.config.last_tid_key)? else {
            return Ok(None);
        };
        match Tid::from_slice(&raw) {
            Some(tid) => Ok(Some(tid)),
            None => {
                warn!(
                    key = %self.config.last_tid_key,
                    len = raw.len(),
                    "Ignoring persisted last tid with unexpected width"
                );
                Ok(None)
            }
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Current revision of `oid` as `(payload, start_tid)`.
    ///
    /// Only the current slot is consulted. A slot that fails to decode reads
    /// as a miss.
    pub fn load(&self, oid: Oid) -> CacheResult<Option<(Vec<u8>, Tid)>> {
        let mut state = self.lock()?;
        let Some(entry) = self.read_current(oid)? else {
            return Ok(None);
        };

        state.stats.accesses += 1;
        Ok(Some((entry.payload, entry.start_tid)))
    }

    /// The revision of `oid` that was current just before `before_tid`, as
    /// `(payload, start_tid, end_tid)`.
    ///
    /// Returns `None` when no indexed revision starts before `before_tid`,
    /// and also when the closest one ended before it (a gap in the known
    /// history). Callers cannot tell the two apart.
    pub fn load_before(
        &self,
        oid: Oid,
        before_tid: Tid,
    ) -> CacheResult<Option<(Vec<u8>, Tid, Tid)>> {
        let mut state = self.lock()?;
        let Some((start_tid, bytes)) = state.noncurrent.latest_before(oid, before_tid) else {
            return Ok(None);
        };

        let entry = match CacheEntry::decode(bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(oid = %oid, start_tid = %start_tid, error = %e, "Malformed non-current entry");
                return Ok(None);
            }
        };
        if entry.end_tid < before_tid {
            debug!(
                oid = %oid,
                start_tid = %entry.start_tid,
                end_tid = %entry.end_tid,
                before_tid = %before_tid,
                "History gap before requested tid"
            );
            return Ok(None);
        }

        state.stats.accesses += 1;
        Ok(Some((entry.payload, entry.start_tid, entry.end_tid)))
    }

    /// Read and decode the current slot of `oid`. Caller holds the lock.
    fn read_current(&self, oid: Oid) -> CacheResult<Option<CacheEntry>> {
        let key = to_key(oid);
        let Some(bytes) = self.store.get(&key)? else {
            return Ok(None);
        };

        match CacheEntry::decode(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(oid = %oid, error = %e, "Malformed current slot, treating as miss");
                if self.config.evict_malformed {
                    self.store.delete(&key)?;
                }
                Ok(None)
            }
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Store a revision of `oid` written by `start_tid`.
    ///
    /// With `end_tid = None` the revision is current: storing the same
    /// current revision twice is a no-op, storing a different one while a
    /// current slot exists is a conflict. With `end_tid = Some(t)` the
    /// revision is non-current: it overwrites the current slot and is indexed
    /// for [`load_before`](Self::load_before), unless `(oid, start_tid)` is
    /// already indexed. A zero `end_tid` is treated as `None`.
    ///
    /// # Errors
    ///
    /// `CacheError::CurrentRevisionConflict` on a differing current write.
    pub fn store(
        &self,
        oid: Oid,
        start_tid: Tid,
        end_tid: Option<Tid>,
        payload: &[u8],
    ) -> CacheResult<()> {
        let mut state = self.lock()?;
        let key = to_key(oid);

        match end_tid.filter(|tid| !tid.is_zero()) {
            None => {
                if let Some(existing) = self.read_current(oid)? {
                    if existing.start_tid == start_tid {
                        debug!(oid = %oid, start_tid = %start_tid, "Current revision already cached");
                        return Ok(());
                    }
                    warn!(
                        oid = %oid,
                        existing = %existing.start_tid,
                        attempted = %start_tid,
                        "Conflicting current revision"
                    );
                    return Err(CacheError::CurrentRevisionConflict {
                        oid,
                        existing: existing.start_tid,
                        attempted: start_tid,
                    });
                }

                let encoded = encode_parts(oid, start_tid, Tid::ZERO, payload)?;
                self.store.set(&key, &encoded)?;
                debug!(oid = %oid, start_tid = %start_tid, "Stored current revision");
            }
            Some(end_tid) => {
                if state.noncurrent.contains(oid, start_tid) {
                    debug!(oid = %oid, start_tid = %start_tid, "Non-current revision already cached");
                    return Ok(());
                }
                if state.noncurrent.below_retained_window(oid, start_tid) {
                    debug!(
                        oid = %oid,
                        start_tid = %start_tid,
                        "Non-current revision older than retained history"
                    );
                    return Ok(());
                }

                let encoded = encode_parts(oid, start_tid, end_tid, payload)?;
                self.store.set(&key, &encoded)?;
                state.noncurrent.insert(oid, start_tid, encoded);
                debug!(
                    oid = %oid,
                    start_tid = %start_tid,
                    end_tid = %end_tid,
                    "Stored non-current revision"
                );
            }
        }

        state.stats.adds += 1;
        Ok(())
    }

    /// Evict the current slot of `oid`.
    ///
    /// With `tid = Some(t)` the watermark is first brought up to `t`. A server
    /// invalidation older than the watermark is rejected and evicts nothing;
    /// a local one is accepted and leaves the watermark alone. With
    /// `tid = None` the slot is evicted unconditionally.
    ///
    /// # Errors
    ///
    /// `CacheError::OrderingViolation` for an out-of-order server
    /// invalidation.
    pub fn invalidate(
        &self,
        oid: Oid,
        tid: Option<Tid>,
        server_invalidation: bool,
    ) -> CacheResult<()> {
        let mut state = self.lock()?;

        if let Some(tid) = tid {
            let last_tid = state.last_tid;
            match last_tid {
                Some(last) if tid < last => {
                    if server_invalidation {
                        warn!(oid = %oid, tid = %tid, last = %last, "Out-of-order server invalidation");
                        return Err(CacheError::OrderingViolation {
                            operation: "invalidate",
                            attempted: tid,
                            last,
                        });
                    }
                    debug!(oid = %oid, tid = %tid, last = %last, "Accepting late local invalidation");
                }
                Some(last) if tid == last => {}
                _ => self.advance_watermark(&mut state, tid, "invalidate")?,
            }
        }

        let removed = self.store.delete(&to_key(oid))?;
        debug!(oid = %oid, removed, "Invalidated current slot");
        Ok(())
    }

    /// Flush the backing store and forget all non-current history.
    ///
    /// Counters and the in-memory watermark are kept.
    pub fn clear(&self) -> CacheResult<()> {
        let mut state = self.lock()?;
        self.store.flush_all()?;
        state.noncurrent.clear();
        debug!("Cleared cache");
        Ok(())
    }

    // ========================================================================
    // ENUMERATION AND SIZE
    // ========================================================================

    /// Lazily enumerate `(oid, start_tid)` for every entry in the backing
    /// store.
    ///
    /// The key set is snapshotted on the first call to `next` and the engine
    /// lock is taken once per element, so concurrent writers interleave with
    /// the enumeration. Entries evicted in the meantime are skipped, as are
    /// the watermark key, foreign keys and entries that fail to decode.
    pub fn contents(&self) -> Contents<'_, S> {
        Contents {
            cache: self,
            keys: None,
            done: false,
        }
    }

    /// Identity of the entry under `key`, taking the lock for this element.
    fn identity_of(&self, key: &str) -> CacheResult<Option<(Oid, Tid)>> {
        if key == self.config.last_tid_key || !is_entry_key(key) {
            return Ok(None);
        }

        let _state = self.lock()?;
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        match CacheEntry::decode(&bytes) {
            Ok(entry) => Ok(Some((entry.oid, entry.start_tid))),
            Err(e) => {
                warn!(key, error = %e, "Skipping malformed entry");
                Ok(None)
            }
        }
    }

    /// Number of items in the backing store, the watermark key included.
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.store.stats()?.total_items as usize)
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    fn store_is_empty(&self) -> CacheResult<bool> {
        Ok(self.store.stats()?.total_items == 0)
    }

    // ========================================================================
    // COUNTERS AND LIFECYCLE
    // ========================================================================

    pub fn stats(&self) -> CacheResult<CacheStats> {
        Ok(self.lock()?.stats)
    }

    pub fn clear_stats(&self) -> CacheResult<()> {
        self.lock()?.stats = CacheStats::default();
        Ok(())
    }

    /// Release the backing store.
    pub fn close(self) -> CacheResult<()> {
        self.store.close()?;
        debug!("Closed cache");
        Ok(())
    }
}

/// Iterator returned by [`RevisionCache::contents`].
pub struct Contents<'a, S: KvStore> {
    cache: &'a RevisionCache<S>,
    keys: Option<std::vec::IntoIter<String>>,
    done: bool,
}

impl<S: KvStore> Iterator for Contents<'_, S> {
    type Item = CacheResult<(Oid, Tid)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.keys.is_none() {
            match self.cache.store.keys() {
                Ok(keys) => self.keys = Some(keys.into_iter()),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        let keys = self.keys.as_mut()?;

        for key in keys.by_ref() {
            match self.cache.identity_of(&key) {
                Ok(Some(identity)) => return Some(Ok(identity)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvStore;
    use revcache_core::{RetentionPolicy, DEFAULT_LAST_TID_KEY};

    fn oid(n: u64) -> Oid {
        Oid::new(n)
    }

    fn tid(n: u64) -> Tid {
        Tid::new(n)
    }

    fn cache() -> RevisionCache<InMemoryKvStore> {
        RevisionCache::new(InMemoryKvStore::new(), CacheConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = CacheConfig::default().with_last_tid_key("oid:clash");
        let result = RevisionCache::new(InMemoryKvStore::new(), config);
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_store_and_load_current() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();

        assert_eq!(cache.load(oid(1)).unwrap(), Some((b"A".to_vec(), tid(10))));
        assert_eq!(cache.load(oid(2)).unwrap(), None);
        assert_eq!(cache.stats().unwrap(), CacheStats { adds: 1, accesses: 1 });
    }

    #[test]
    fn test_store_current_is_idempotent() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();
        cache.store(oid(1), tid(10), None, b"A").unwrap();

        assert_eq!(cache.stats().unwrap().adds, 1);
        assert_eq!(cache.load(oid(1)).unwrap(), Some((b"A".to_vec(), tid(10))));
    }

    #[test]
    fn test_store_current_conflict() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();

        let err = cache.store(oid(1), tid(11), None, b"B").unwrap_err();
        assert_eq!(
            err,
            CacheError::CurrentRevisionConflict {
                oid: oid(1),
                existing: tid(10),
                attempted: tid(11),
            }
        );
        assert_eq!(cache.load(oid(1)).unwrap(), Some((b"A".to_vec(), tid(10))));
        assert_eq!(cache.stats().unwrap().adds, 1);
    }

    #[test]
    fn test_store_noncurrent_overwrites_slot_and_indexes() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();
        cache.store(oid(1), tid(5), Some(tid(10)), b"old").unwrap();

        // The current slot now holds the non-current revision.
        assert_eq!(cache.load(oid(1)).unwrap(), Some((b"old".to_vec(), tid(5))));
        assert_eq!(
            cache.load_before(oid(1), tid(10)).unwrap(),
            Some((b"old".to_vec(), tid(5), tid(10)))
        );
    }

    #[test]
    fn test_store_noncurrent_duplicate_is_noop() {
        let cache = cache();
        cache.store(oid(1), tid(5), Some(tid(10)), b"first").unwrap();
        cache.store(oid(1), tid(5), Some(tid(10)), b"second").unwrap();

        assert_eq!(cache.stats().unwrap().adds, 1);
        assert_eq!(
            cache.load_before(oid(1), tid(10)).unwrap(),
            Some((b"first".to_vec(), tid(5), tid(10)))
        );
    }

    #[test]
    fn test_store_zero_end_tid_is_current() {
        let cache = cache();
        cache.store(oid(1), tid(10), Some(Tid::ZERO), b"A").unwrap();

        assert_eq!(cache.load(oid(1)).unwrap(), Some((b"A".to_vec(), tid(10))));
        assert_eq!(cache.load_before(oid(1), tid(11)).unwrap(), None);
    }

    #[test]
    fn test_load_before_picks_greatest_earlier_revision() {
        let cache = cache();
        cache.store(oid(1), tid(10), Some(tid(20)), b"t10").unwrap();
        cache.store(oid(1), tid(20), Some(tid(30)), b"t20").unwrap();
        cache.store(oid(1), tid(30), Some(tid(40)), b"t30").unwrap();

        assert_eq!(
            cache.load_before(oid(1), tid(30)).unwrap(),
            Some((b"t20".to_vec(), tid(20), tid(30)))
        );
        assert_eq!(cache.load_before(oid(1), tid(10)).unwrap(), None);
    }

    #[test]
    fn test_load_before_history_gap() {
        let cache = cache();
        cache.store(oid(1), tid(10), Some(tid(15)), b"t10").unwrap();

        // Revision ended at 15, so nothing is known to be valid just before 20.
        assert_eq!(cache.load_before(oid(1), tid(20)).unwrap(), None);
        assert_eq!(
            cache.load_before(oid(1), tid(15)).unwrap(),
            Some((b"t10".to_vec(), tid(10), tid(15)))
        );
    }

    #[test]
    fn test_set_last_tid_monotonic() {
        let cache = cache();
        cache.set_last_tid(tid(5)).unwrap();
        cache.set_last_tid(tid(6)).unwrap();

        let err = cache.set_last_tid(tid(6)).unwrap_err();
        assert!(matches!(err, CacheError::OrderingViolation { .. }));
        let err = cache.set_last_tid(tid(3)).unwrap_err();
        assert_eq!(
            err,
            CacheError::OrderingViolation {
                operation: "set_last_tid",
                attempted: tid(3),
                last: tid(6),
            }
        );
        assert_eq!(cache.get_last_tid().unwrap(), Some(tid(6)));
    }

    #[test]
    fn test_set_last_tid_after_clear_accepts_lower() {
        let cache = cache();
        cache.set_last_tid(tid(5)).unwrap();
        cache.clear().unwrap();

        cache.set_last_tid(tid(2)).unwrap();
        assert_eq!(cache.get_last_tid().unwrap(), Some(tid(2)));
    }

    #[test]
    fn test_set_last_tid_persists_raw_bytes() {
        let cache = cache();
        cache.set_last_tid(tid(0x0B)).unwrap();

        let raw = cache.backing_store().get(DEFAULT_LAST_TID_KEY).unwrap();
        assert_eq!(raw, Some(tid(0x0B).to_bytes().to_vec()));
    }

    #[test]
    fn test_get_last_tid_reads_persisted() {
        let store = InMemoryKvStore::new();
        store.set(DEFAULT_LAST_TID_KEY, &tid(42).to_bytes()).unwrap();
        let cache = RevisionCache::new(store, CacheConfig::default()).unwrap();

        assert_eq!(cache.get_last_tid().unwrap(), Some(tid(42)));
    }

    #[test]
    fn test_get_last_tid_ignores_bad_width() {
        let store = InMemoryKvStore::new();
        store.set(DEFAULT_LAST_TID_KEY, b"short").unwrap();
        let cache = RevisionCache::new(store, CacheConfig::default()).unwrap();

        assert_eq!(cache.get_last_tid().unwrap(), None);
    }

    #[test]
    fn test_invalidate_advances_watermark_and_evicts() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();
        cache.invalidate(oid(1), Some(tid(11)), true).unwrap();

        assert_eq!(cache.get_last_tid().unwrap(), Some(tid(11)));
        assert_eq!(cache.load(oid(1)).unwrap(), None);
    }

    #[test]
    fn test_invalidate_out_of_order() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();
        cache.set_last_tid(tid(20)).unwrap();

        let err = cache.invalidate(oid(1), Some(tid(15)), true).unwrap_err();
        assert!(matches!(
            err,
            CacheError::OrderingViolation { operation: "invalidate", .. }
        ));
        // Nothing evicted.
        assert!(cache.load(oid(1)).unwrap().is_some());

        cache.invalidate(oid(1), Some(tid(15)), false).unwrap();
        assert_eq!(cache.load(oid(1)).unwrap(), None);
        assert_eq!(cache.get_last_tid().unwrap(), Some(tid(20)));
    }

    #[test]
    fn test_invalidate_equal_tid_only_evicts() {
        let cache = cache();
        cache.set_last_tid(tid(20)).unwrap();
        cache.store(oid(1), tid(10), None, b"A").unwrap();

        cache.invalidate(oid(1), Some(tid(20)), true).unwrap();
        assert_eq!(cache.load(oid(1)).unwrap(), None);
        assert_eq!(cache.get_last_tid().unwrap(), Some(tid(20)));
    }

    #[test]
    fn test_invalidate_without_tid() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();
        cache.invalidate(oid(1), None, true).unwrap();

        assert_eq!(cache.load(oid(1)).unwrap(), None);
        assert_eq!(cache.get_last_tid().unwrap(), None);
    }

    #[test]
    fn test_malformed_slot_reads_as_miss_and_is_evicted() {
        let cache = cache();
        cache.backing_store().set(&to_key(oid(1)), b"garbage").unwrap();

        assert_eq!(cache.load(oid(1)).unwrap(), None);
        assert!(cache.backing_store().get(&to_key(oid(1))).unwrap().is_none());
        assert_eq!(cache.stats().unwrap().accesses, 0);

        // Slot is free again for a current write.
        cache.store(oid(1), tid(10), None, b"A").unwrap();
    }

    #[test]
    fn test_malformed_slot_kept_without_eviction() {
        let config = CacheConfig::default().with_evict_malformed(false);
        let cache = RevisionCache::new(InMemoryKvStore::new(), config).unwrap();
        cache.backing_store().set(&to_key(oid(1)), b"garbage").unwrap();

        assert_eq!(cache.load(oid(1)).unwrap(), None);
        assert!(cache.backing_store().get(&to_key(oid(1))).unwrap().is_some());
    }

    #[test]
    fn test_contents_skips_reserved_and_foreign_keys() {
        let cache = cache();
        cache.store(oid(1), tid(10), None, b"A").unwrap();
        cache.store(oid(2), tid(5), Some(tid(9)), b"B").unwrap();
        cache.set_last_tid(tid(20)).unwrap();
        cache.backing_store().set("unrelated", b"x").unwrap();
        cache.backing_store().set(&to_key(oid(3)), b"garbage").unwrap();

        let mut contents: Vec<(Oid, Tid)> = cache.contents().collect::<CacheResult<_>>().unwrap();
        contents.sort();
        assert_eq!(contents, vec![(oid(1), tid(10)), (oid(2), tid(5))]);
    }

    #[test]
    fn test_clear_keeps_counters_and_drops_history() {
        let cache = cache();
        cache.store(oid(1), tid(10), Some(tid(20)), b"A").unwrap();
        cache.clear().unwrap();

        assert!(cache.is_empty().unwrap());
        assert_eq!(cache.load_before(oid(1), tid(20)).unwrap(), None);
        assert_eq!(cache.stats().unwrap().adds, 1);

        cache.clear_stats().unwrap();
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn test_len_counts_watermark_key() {
        let cache = cache();
        assert_eq!(cache.len().unwrap(), 0);

        cache.store(oid(1), tid(10), None, b"A").unwrap();
        cache.set_last_tid(tid(11)).unwrap();
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn test_poisoned_lock_is_an_error() {
        let cache = cache();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = cache.state.lock().unwrap();
            panic!("poison the engine lock");
        }));
        assert!(result.is_err());

        assert_eq!(
            cache.load(oid(1)).unwrap_err(),
            CacheError::Store(StoreError::LockPoisoned)
        );
        assert!(cache.stats().is_err());
    }

    #[test]
    fn test_retention_applies_to_load_before() {
        let config = CacheConfig::default()
            .with_retention(RetentionPolicy::MaxRevisionsPerOid { max: 1 });
        let cache = RevisionCache::new(InMemoryKvStore::new(), config).unwrap();
        cache.store(oid(1), tid(10), Some(tid(20)), b"t10").unwrap();
        cache.store(oid(1), tid(20), Some(tid(30)), b"t20").unwrap();

        assert_eq!(cache.load_before(oid(1), tid(20)).unwrap(), None);
        assert!(cache.load_before(oid(1), tid(30)).unwrap().is_some());
    }

    #[test]
    fn test_replay_below_retained_window_is_noop() {
        let config = CacheConfig::default()
            .with_retention(RetentionPolicy::MaxRevisionsPerOid { max: 1 });
        let cache = RevisionCache::new(InMemoryKvStore::new(), config).unwrap();
        cache.store(oid(1), tid(20), Some(tid(30)), b"t20").unwrap();

        for _ in 0..3 {
            cache.store(oid(1), tid(10), Some(tid(20)), b"t10").unwrap();
        }

        assert_eq!(cache.stats().unwrap().adds, 1);
        assert_eq!(cache.load(oid(1)).unwrap(), Some((b"t20".to_vec(), tid(20))));
        assert_eq!(cache.load_before(oid(1), tid(20)).unwrap(), None);
        assert!(cache.load_before(oid(1), tid(30)).unwrap().is_some());
    }
}
