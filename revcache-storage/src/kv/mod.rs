//! Backing key-value stores.
//!
//! [`KvStore`] is the seam between the revision cache and whatever physically
//! holds its bytes: a memcache-style service, LMDB on local disk, or a plain
//! in-process map.

pub mod lmdb;
pub mod memory;
pub mod traits;

pub use lmdb::{LmdbKvStore, LmdbStoreError};
pub use memory::InMemoryKvStore;
pub use traits::{KvStats, KvStore};
