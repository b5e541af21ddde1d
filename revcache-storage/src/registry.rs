//! Explicit table of cache constructors.
//!
//! Maps each [`BackendKind`] to a function that builds a [`ClientCache`] from
//! a [`CacheConfig`]. Constructors must be registered explicitly; nothing is
//! discovered or held globally.

use std::collections::HashMap;

use revcache_core::{BackendConfig, BackendKind, CacheConfig, CacheResult, ConfigError, StoreError};
use tracing::debug;

use crate::client::ClientCache;
use crate::engine::RevisionCache;
use crate::kv::{InMemoryKvStore, LmdbKvStore};

/// Builds a cache for one backend kind.
pub type CacheConstructor =
    Box<dyn Fn(&CacheConfig) -> CacheResult<Box<dyn ClientCache>> + Send + Sync>;

/// Registry of cache constructors keyed by backend kind.
///
/// # Example
/// ```ignore
/// let registry = CacheRegistry::with_builtin();
/// let cache = registry.open(&CacheConfig::default().with_lmdb("/var/cache/revcache", 256))?;
/// ```
pub struct CacheRegistry {
    constructors: HashMap<BackendKind, CacheConstructor>,
}

impl CacheRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the in-memory and LMDB stores registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BackendKind::Memory, Box::new(open_memory));
        registry.register(BackendKind::Lmdb, Box::new(open_lmdb));
        registry
    }

    /// Register a constructor, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: BackendKind, constructor: CacheConstructor) {
        self.constructors.insert(kind, constructor);
    }

    pub fn is_registered(&self, kind: BackendKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Validate `config` and build a cache for its backend.
    ///
    /// # Errors
    ///
    /// `ConfigError::BackendNotRegistered` if no constructor handles the
    /// configured backend, otherwise whatever validation or the constructor
    /// reports.
    pub fn open(&self, config: &CacheConfig) -> CacheResult<Box<dyn ClientCache>> {
        config.validate()?;

        let kind = config.backend.kind();
        let constructor =
            self.constructors
                .get(&kind)
                .ok_or_else(|| ConfigError::BackendNotRegistered {
                    backend: kind.to_string(),
                })?;

        debug!(backend = %kind, "Opening cache");
        constructor(config)
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.constructors.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("CacheRegistry")
            .field("backends", &kinds)
            .finish()
    }
}

fn open_memory(config: &CacheConfig) -> CacheResult<Box<dyn ClientCache>> {
    let cache = RevisionCache::new(InMemoryKvStore::new(), config.clone())?;
    Ok(Box::new(cache))
}

fn open_lmdb(config: &CacheConfig) -> CacheResult<Box<dyn ClientCache>> {
    let BackendConfig::Lmdb { path, map_size_mb } = &config.backend else {
        return Err(ConfigError::InvalidValue {
            field: "backend".to_string(),
            value: config.backend.kind().to_string(),
            reason: "LMDB constructor needs an lmdb backend".to_string(),
        }
        .into());
    };

    let store = LmdbKvStore::new(path, *map_size_mb).map_err(StoreError::from)?;
    let cache = RevisionCache::new(store, config.clone())?;
    Ok(Box::new(cache))
}
