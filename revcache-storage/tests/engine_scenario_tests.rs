use revcache_core::{CacheConfig, CacheError, StoreError};
use revcache_storage::{CacheRegistry, ClientCache, KvStore};
use revcache_test_utils::assertions::{
    assert_conflict, assert_ordering_violation, assert_store_unavailable,
};
use revcache_test_utils::fixtures::{failing_cache, memory_cache, oid, tid};
use revcache_test_utils::init_test_tracing;

#[test]
fn store_invalidate_restore_scenario() {
    init_test_tracing();
    let cache = memory_cache();

    cache.store(oid(0x01), tid(0x0A), None, b"A").expect("store A");
    assert_eq!(cache.load(oid(0x01)).expect("load"), Some((b"A".to_vec(), tid(0x0A))));

    cache
        .invalidate(oid(0x01), Some(tid(0x0B)), true)
        .expect("invalidate");
    assert_eq!(cache.get_last_tid().expect("last tid"), Some(tid(0x0B)));
    assert_eq!(cache.load(oid(0x01)).expect("load"), None);

    cache.store(oid(0x01), tid(0x0B), None, b"B").expect("store B");
    assert_eq!(cache.load(oid(0x01)).expect("load"), Some((b"B".to_vec(), tid(0x0B))));

    // Invalidation evicted "A" without recording it as non-current.
    assert_eq!(cache.load_before(oid(0x01), tid(0x0B)).expect("load_before"), None);
}

#[test]
fn current_write_is_idempotent() {
    let cache = memory_cache();
    cache.store(oid(1), tid(10), None, b"data").expect("first store");
    let stats = cache.stats().expect("stats");
    let len = cache.len().expect("len");

    cache.store(oid(1), tid(10), None, b"data").expect("repeat store");

    assert_eq!(cache.stats().expect("stats"), stats);
    assert_eq!(cache.len().expect("len"), len);
    assert_eq!(cache.load(oid(1)).expect("load"), Some((b"data".to_vec(), tid(10))));
}

#[test]
fn current_write_conflict() {
    let cache = memory_cache();
    cache.store(oid(1), tid(10), None, b"d1").expect("store");

    assert_conflict(&cache.store(oid(1), tid(12), None, b"d2"));
}

#[test]
fn historical_lookup() {
    let cache = memory_cache();
    cache.store(oid(7), tid(1), Some(tid(2)), b"t1").expect("store t1");
    cache.store(oid(7), tid(2), Some(tid(3)), b"t2").expect("store t2");
    cache.store(oid(7), tid(3), Some(tid(4)), b"t3").expect("store t3");

    assert_eq!(
        cache.load_before(oid(7), tid(3)).expect("load_before"),
        Some((b"t2".to_vec(), tid(2), tid(3)))
    );
    assert_eq!(cache.load_before(oid(7), tid(1)).expect("load_before"), None);
    assert_eq!(cache.stats().expect("stats").accesses, 1);
}

#[test]
fn invalidate_ordering() {
    let cache = memory_cache();
    cache.store(oid(1), tid(5), None, b"x").expect("store");
    cache.set_last_tid(tid(10)).expect("set_last_tid");

    assert_ordering_violation(&cache.invalidate(oid(1), Some(tid(9)), true));
    assert!(cache.load(oid(1)).expect("load").is_some());

    cache
        .invalidate(oid(1), Some(tid(9)), false)
        .expect("local invalidation");
    assert_eq!(cache.get_last_tid().expect("last tid"), Some(tid(10)));
    assert_eq!(cache.load(oid(1)).expect("load"), None);
}

#[test]
fn monotonic_watermark() {
    let cache = memory_cache();
    cache.set_last_tid(tid(3)).expect("first");

    assert_ordering_violation(&cache.set_last_tid(tid(3)));
    assert_ordering_violation(&cache.set_last_tid(tid(1)));
    cache.set_last_tid(tid(4)).expect("advance");
}

#[test]
fn eviction_after_invalidate() {
    let cache = memory_cache();
    for n in 1..=5 {
        cache.store(oid(n), tid(n), None, b"v").expect("store");
    }
    cache.invalidate(oid(3), Some(tid(6)), true).expect("invalidate");

    assert_eq!(cache.load(oid(3)).expect("load"), None);
    assert!(cache.load(oid(2)).expect("load").is_some());

    let mut seen: Vec<u64> = cache
        .contents()
        .map(|item| item.expect("contents").0.as_u64())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 4, 5]);
}

#[test]
fn store_outage_propagates() {
    let (cache, store) = failing_cache();
    cache.store(oid(1), tid(10), None, b"A").expect("store");

    store.set_offline(true);
    assert_store_unavailable(&cache.load(oid(1)));
    assert_store_unavailable(&cache.store(oid(2), tid(10), None, b"B"));
    assert_store_unavailable(&cache.set_last_tid(tid(11)));
    assert_store_unavailable(&cache.invalidate(oid(1), None, true));
    assert_store_unavailable(&cache.clear());
    assert!(matches!(
        cache.contents().next(),
        Some(Err(CacheError::Store(StoreError::Unavailable { .. })))
    ));

    // Failed watermark write left the watermark untouched.
    store.set_offline(false);
    assert_eq!(cache.get_last_tid().expect("last tid"), None);
    assert_eq!(cache.load(oid(1)).expect("load"), Some((b"A".to_vec(), tid(10))));
    assert!(store.rejected() >= 6);
}

#[test]
fn contents_tolerates_eviction_mid_iteration() {
    let cache = memory_cache();
    for n in 1..=4 {
        cache.store(oid(n), tid(1), None, b"v").expect("store");
    }

    let mut contents = cache.contents();
    let first = contents.next().expect("first item").expect("first item ok");
    for n in 1..=4 {
        cache.invalidate(oid(n), None, true).expect("invalidate");
    }

    assert!(contents.next().is_none());
    assert!(first.0.as_u64() >= 1 && first.0.as_u64() <= 4);
}

#[test]
fn clear_empties_store_and_history() {
    let cache = memory_cache();
    cache.store(oid(1), tid(1), Some(tid(2)), b"old").expect("store");
    cache.set_last_tid(tid(5)).expect("set_last_tid");

    cache.clear().expect("clear");

    assert!(cache.is_empty().expect("is_empty"));
    assert!(cache.backing_store().keys().expect("keys").is_empty());
    assert_eq!(cache.load_before(oid(1), tid(2)).expect("load_before"), None);
}

#[test]
fn registry_cache_through_trait_object() {
    let registry = CacheRegistry::with_builtin();
    let cache: Box<dyn ClientCache> = registry.open(&CacheConfig::default()).expect("open");

    cache.store(oid(1), tid(1), Some(tid(2)), b"old").expect("store");
    cache.store(oid(1), tid(2), Some(tid(3)), b"new").expect("store");

    let dump = cache.dump().expect("dump");
    assert_eq!(dump.noncurrent.len(), 2);
    assert_eq!(dump.current.len(), 1);
    cache.log_stats().expect("log_stats");
    cache.close().expect("close");
}
