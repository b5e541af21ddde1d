//! In-memory index of non-current revisions.
//!
//! Maps each OID to its historical revisions ordered by start TID. Entries
//! are stored encoded, exactly as they would sit in the backing store, and
//! are immutable once written. The index is never persisted; a restart
//! starts it empty.

use std::collections::{BTreeMap, HashMap};

use revcache_core::{Oid, RetentionPolicy, Tid};

/// Ordered per-OID index of superseded revisions.
#[derive(Debug)]
pub struct NoncurrentIndex {
    revisions: HashMap<Oid, BTreeMap<Tid, Vec<u8>>>,
    retention: RetentionPolicy,
}

impl Default for NoncurrentIndex {
    fn default() -> Self {
        Self::new(RetentionPolicy::Unbounded)
    }
}

impl NoncurrentIndex {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            revisions: HashMap::new(),
            retention,
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Whether a revision of `oid` starting at `start_tid` is indexed.
    pub fn contains(&self, oid: Oid, start_tid: Tid) -> bool {
        self.revisions
            .get(&oid)
            .is_some_and(|by_tid| by_tid.contains_key(&start_tid))
    }

    /// Whether a revision cap is full for `oid` and `start_tid` is older than
    /// every retained revision, so indexing it would drop it straight away.
    pub fn below_retained_window(&self, oid: Oid, start_tid: Tid) -> bool {
        let Some(max) = self.retention.limit() else {
            return false;
        };
        self.revisions.get(&oid).is_some_and(|by_tid| {
            by_tid.len() >= max
                && by_tid
                    .first_key_value()
                    .is_some_and(|(oldest, _)| start_tid < *oldest)
        })
    }

    /// Index an encoded revision.
    ///
    /// Returns `false` without touching the index if `(oid, start_tid)` is
    /// already present or falls below the retained window. When a revision
    /// cap is configured the oldest revisions of `oid` beyond the cap are
    /// dropped.
    pub fn insert(&mut self, oid: Oid, start_tid: Tid, encoded: Vec<u8>) -> bool {
        if self.below_retained_window(oid, start_tid) {
            return false;
        }
        let by_tid = self.revisions.entry(oid).or_default();
        if by_tid.contains_key(&start_tid) {
            return false;
        }
        by_tid.insert(start_tid, encoded);

        if let Some(max) = self.retention.limit() {
            while by_tid.len() > max {
                by_tid.pop_first();
            }
        }
        true
    }

    /// The revision of `oid` with the greatest start TID strictly less than
    /// `before`.
    pub fn latest_before(&self, oid: Oid, before: Tid) -> Option<(Tid, &[u8])> {
        self.revisions
            .get(&oid)?
            .range(..before)
            .next_back()
            .map(|(tid, bytes)| (*tid, bytes.as_slice()))
    }

    /// Number of revisions indexed for `oid`.
    pub fn revision_count(&self, oid: Oid) -> usize {
        self.revisions.get(&oid).map_or(0, BTreeMap::len)
    }

    /// Total number of revisions indexed.
    pub fn len(&self) -> usize {
        self.revisions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.values().all(BTreeMap::is_empty)
    }

    /// Iterate all `(oid, start_tid, encoded)` triples, in no particular OID
    /// order but ascending TID order within an OID.
    pub fn iter(&self) -> impl Iterator<Item = (Oid, Tid, &[u8])> + '_ {
        self.revisions.iter().flat_map(|(oid, by_tid)| {
            by_tid
                .iter()
                .map(move |(tid, bytes)| (*oid, *tid, bytes.as_slice()))
        })
    }

    pub fn clear(&mut self) {
        self.revisions.clear();
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: latest_before agrees with a linear scan for the greatest
        /// start tid strictly below the bound.
        #[test]
        fn prop_latest_before_matches_scan(
            tids in prop::collection::btree_set(1u64..1000, 0..32),
            before in 0u64..1100,
        ) {
            let mut index = NoncurrentIndex::default();
            for t in &tids {
                index.insert(Oid::new(7), Tid::new(*t), t.to_be_bytes().to_vec());
            }

            let expected = tids.iter().copied().filter(|t| *t < before).max();
            let found = index.latest_before(Oid::new(7), Tid::new(before)).map(|(t, _)| t.as_u64());
            prop_assert_eq!(found, expected);
        }

        /// Property: a revision cap is never exceeded and keeps the newest.
        #[test]
        fn prop_retention_keeps_newest(
            tids in prop::collection::vec(1u64..1000, 1..64),
            max in 1usize..8,
        ) {
            let mut index = NoncurrentIndex::new(RetentionPolicy::MaxRevisionsPerOid { max });
            for t in &tids {
                index.insert(Oid::new(1), Tid::new(*t), Vec::new());
            }
            prop_assert!(index.revision_count(Oid::new(1)) <= max);
        }
    }
}
