//! revcache Test Utilities
//!
//! Shared test infrastructure for the revcache workspace:
//! - Proptest generators for identifiers, entries and configs
//! - A backing store that can be switched offline
//! - Fixtures for common caches
//! - Custom assertions for cache errors
//! - One-time tracing setup for tests

pub use revcache_core::{
    BackendConfig, CacheConfig, CacheEntry, CacheError, CacheResult, ConfigError, Oid,
    RetentionPolicy, StoreError, StoreResult, Tid,
};
pub use revcache_storage::{InMemoryKvStore, KvStats, KvStore, LmdbKvStore, RevisionCache};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Once;

// ============================================================================
// FAILURE INJECTION
// ============================================================================

/// Backing store wrapper that fails every call while switched offline.
///
/// Models an unreachable cache service: calls report
/// `StoreError::Unavailable` and never touch the inner store.
#[derive(Debug, Default)]
pub struct FailingKvStore<S = InMemoryKvStore> {
    inner: S,
    offline: AtomicBool,
    rejected: AtomicU64,
}

impl<S: KvStore> FailingKvStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls rejected while offline.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable {
                reason: "store switched offline".to_string(),
            });
        }
        Ok(())
    }
}

impl<S: KvStore> KvStore for FailingKvStore<S> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(key)
    }

    fn flush_all(&self) -> StoreResult<()> {
        self.check()?;
        self.inner.flush_all()
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.check()?;
        self.inner.keys()
    }

    fn stats(&self) -> StoreResult<KvStats> {
        self.check()?;
        self.inner.stats()
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG`, once per process.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for revcache types.

    use super::*;
    use proptest::prelude::*;

    /// Generate any OID.
    pub fn arb_oid() -> impl Strategy<Value = Oid> {
        any::<u64>().prop_map(Oid::new)
    }

    /// Generate a non-zero TID.
    pub fn arb_tid() -> impl Strategy<Value = Tid> {
        (1u64..=u64::MAX).prop_map(Tid::new)
    }

    /// Generate a payload of up to 1 KiB.
    pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..1024)
    }

    /// Generate an entry, current or non-current.
    pub fn arb_entry() -> impl Strategy<Value = CacheEntry> {
        (arb_oid(), arb_tid(), prop::option::of(arb_tid()), arb_payload()).prop_map(
            |(oid, start_tid, end_tid, payload)| {
                CacheEntry::with_optional_end(oid, start_tid, end_tid, payload)
            },
        )
    }

    /// Generate a strictly increasing run of TIDs.
    pub fn arb_increasing_tids(max_len: usize) -> impl Strategy<Value = Vec<Tid>> {
        prop::collection::btree_set(1u64..1_000_000, 1..max_len.max(2))
            .prop_map(|set| set.into_iter().map(Tid::new).collect())
    }

    /// Generate a retention policy.
    pub fn arb_retention() -> impl Strategy<Value = RetentionPolicy> {
        prop_oneof![
            Just(RetentionPolicy::Unbounded),
            (1usize..16).prop_map(|max| RetentionPolicy::MaxRevisionsPerOid { max }),
        ]
    }

    /// Generate a valid in-memory config.
    pub fn arb_valid_config() -> impl Strategy<Value = CacheConfig> {
        ("[A-Z][A-Z_]{0,15}", arb_retention(), any::<bool>()).prop_map(
            |(key, retention, evict_malformed)| {
                CacheConfig::default()
                    .with_last_tid_key(key)
                    .with_retention(retention)
                    .with_evict_malformed(evict_malformed)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built caches and identifiers for common scenarios.

    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    pub fn oid(n: u64) -> Oid {
        Oid::new(n)
    }

    pub fn tid(n: u64) -> Tid {
        Tid::new(n)
    }

    /// Cache over a fresh in-memory store with the default config.
    pub fn memory_cache() -> RevisionCache<InMemoryKvStore> {
        RevisionCache::new(InMemoryKvStore::new(), CacheConfig::default())
            .expect("default config should validate")
    }

    /// Cache with the given config over a fresh in-memory store.
    pub fn memory_cache_with(config: CacheConfig) -> RevisionCache<InMemoryKvStore> {
        RevisionCache::new(InMemoryKvStore::new(), config).expect("config should validate")
    }

    /// Cache over an offline-capable store. The store handle is shared so
    /// tests can flip it while the cache holds it.
    pub fn failing_cache() -> (RevisionCache<Arc<FailingKvStore>>, Arc<FailingKvStore>) {
        let store = Arc::new(FailingKvStore::new(InMemoryKvStore::new()));
        let cache = RevisionCache::new(Arc::clone(&store), CacheConfig::default())
            .expect("default config should validate");
        (cache, store)
    }

    /// Config for an LMDB store inside `dir`.
    pub fn lmdb_config(dir: &TempDir) -> CacheConfig {
        CacheConfig::default().with_lmdb(dir.path().join("revcache"), 10)
    }

    /// Cache over an LMDB store inside `dir`.
    pub fn lmdb_cache(dir: &TempDir) -> RevisionCache<LmdbKvStore> {
        let config = lmdb_config(dir);
        let store = LmdbKvStore::new(dir.path().join("revcache"), 10)
            .expect("LMDB store should open");
        RevisionCache::new(store, config).expect("config should validate")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for revcache error variants.

    use super::*;

    /// Assert that a result is an ordering violation.
    #[track_caller]
    pub fn assert_ordering_violation<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::OrderingViolation { .. }) => {}
            other => panic!("Expected OrderingViolation, got: {:?}", other),
        }
    }

    /// Assert that a result is a current revision conflict.
    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::CurrentRevisionConflict { .. }) => {}
            other => panic!("Expected CurrentRevisionConflict, got: {:?}", other),
        }
    }

    /// Assert that a result is a store unavailability error.
    #[track_caller]
    pub fn assert_store_unavailable<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::Store(StoreError::Unavailable { .. })) => {}
            other => panic!("Expected Store(Unavailable), got: {:?}", other),
        }
    }

    /// Assert that a result is a config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }
}
