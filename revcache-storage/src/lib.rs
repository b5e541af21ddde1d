//! revcache Storage - Revision Cache Engine and Backing Stores
//!
//! The [`RevisionCache`] engine enforces current/non-current semantics and
//! transaction-id ordering on top of an injected [`KvStore`]. Historical
//! revisions are kept in memory by [`NoncurrentIndex`]; only current slots
//! and the last-known TID reach the backing store.

pub mod client;
pub mod engine;
pub mod kv;
pub mod noncurrent;
pub mod registry;
pub mod stats;

pub use client::{ClientCache, ContentsIter};
pub use engine::{Contents, RevisionCache};
pub use kv::{InMemoryKvStore, KvStats, KvStore, LmdbKvStore, LmdbStoreError};
pub use noncurrent::NoncurrentIndex;
pub use registry::{CacheConstructor, CacheRegistry};
pub use stats::{CacheDump, CacheStats, CacheStatsReport, CurrentEntry, NoncurrentEntry};
