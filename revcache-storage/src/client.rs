//! Client cache capability trait.
//!
//! The surface a database client drives. [`RevisionCache`] implements it for
//! every backing store, and [`crate::CacheRegistry`] hands out boxed
//! instances so callers need not name the store type.

use revcache_core::{CacheResult, Oid, Tid};

use crate::engine::RevisionCache;
use crate::kv::KvStore;
use crate::stats::{CacheDump, CacheStats};

/// Iterator over `(oid, start_tid)` identities of cached entries.
pub type ContentsIter<'a> = Box<dyn Iterator<Item = CacheResult<(Oid, Tid)>> + 'a>;

/// MVCC client cache.
///
/// See [`RevisionCache`] for the semantics of each operation. `close`
/// consumes the cache, so nothing can be called on it afterwards.
pub trait ClientCache: Send + Sync {
    /// Current revision as `(payload, start_tid)`.
    fn load(&self, oid: Oid) -> CacheResult<Option<(Vec<u8>, Tid)>>;

    /// Revision current just before `before_tid`, as
    /// `(payload, start_tid, end_tid)`.
    fn load_before(&self, oid: Oid, before_tid: Tid) -> CacheResult<Option<(Vec<u8>, Tid, Tid)>>;

    fn store(
        &self,
        oid: Oid,
        start_tid: Tid,
        end_tid: Option<Tid>,
        payload: &[u8],
    ) -> CacheResult<()>;

    fn invalidate(&self, oid: Oid, tid: Option<Tid>, server_invalidation: bool)
        -> CacheResult<()>;

    fn set_last_tid(&self, tid: Tid) -> CacheResult<()>;

    fn get_last_tid(&self) -> CacheResult<Option<Tid>>;

    fn clear(&self) -> CacheResult<()>;

    fn contents(&self) -> ContentsIter<'_>;

    fn stats(&self) -> CacheResult<CacheStats>;

    fn clear_stats(&self) -> CacheResult<()>;

    fn len(&self) -> CacheResult<usize>;

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    fn log_stats(&self) -> CacheResult<()>;

    fn dump(&self) -> CacheResult<CacheDump>;

    /// Release the backing store.
    fn close(self: Box<Self>) -> CacheResult<()>;
}

impl<S: KvStore> ClientCache for RevisionCache<S> {
    fn load(&self, oid: Oid) -> CacheResult<Option<(Vec<u8>, Tid)>> {
        RevisionCache::load(self, oid)
    }

    fn load_before(&self, oid: Oid, before_tid: Tid) -> CacheResult<Option<(Vec<u8>, Tid, Tid)>> {
        RevisionCache::load_before(self, oid, before_tid)
    }

    fn store(
        &self,
        oid: Oid,
        start_tid: Tid,
        end_tid: Option<Tid>,
        payload: &[u8],
    ) -> CacheResult<()> {
        RevisionCache::store(self, oid, start_tid, end_tid, payload)
    }

    fn invalidate(
        &self,
        oid: Oid,
        tid: Option<Tid>,
        server_invalidation: bool,
    ) -> CacheResult<()> {
        RevisionCache::invalidate(self, oid, tid, server_invalidation)
    }

    fn set_last_tid(&self, tid: Tid) -> CacheResult<()> {
        RevisionCache::set_last_tid(self, tid)
    }

    fn get_last_tid(&self) -> CacheResult<Option<Tid>> {
        RevisionCache::get_last_tid(self)
    }

    fn clear(&self) -> CacheResult<()> {
        RevisionCache::clear(self)
    }

    fn contents(&self) -> ContentsIter<'_> {
        Box::new(RevisionCache::contents(self))
    }

    fn stats(&self) -> CacheResult<CacheStats> {
        RevisionCache::stats(self)
    }

    fn clear_stats(&self) -> CacheResult<()> {
        RevisionCache::clear_stats(self)
    }

    fn len(&self) -> CacheResult<usize> {
        RevisionCache::len(self)
    }

    fn is_empty(&self) -> CacheResult<bool> {
        RevisionCache::is_empty(self)
    }

    fn log_stats(&self) -> CacheResult<()> {
        RevisionCache::log_stats(self)
    }

    fn dump(&self) -> CacheResult<CacheDump> {
        RevisionCache::dump(self)
    }

    fn close(self: Box<Self>) -> CacheResult<()> {
        RevisionCache::close(*self)
    }
}
