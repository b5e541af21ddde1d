//! revcache Core - Identifiers, Entry Codec and Configuration
//!
//! Pure data types and stateless helpers shared by every revcache crate.
//! Nothing here touches a backing store or holds a lock.

pub mod config;
pub mod entry;
pub mod error;
pub mod identity;
pub mod key;

pub use config::{BackendConfig, BackendKind, CacheConfig, RetentionPolicy, MAX_MAP_SIZE_MB};
pub use entry::{encode_parts, CacheEntry, FIELD_COUNT};
pub use error::{
    CacheError, CacheResult, ConfigError, EntryError, StoreError, StoreResult,
};
pub use identity::{Oid, Tid, ID_WIDTH};
pub use key::{from_key, is_entry_key, to_key, DEFAULT_LAST_TID_KEY, OID_KEY_PREFIX};
