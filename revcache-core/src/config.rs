//! Configuration types

use crate::error::ConfigError;
use crate::key::{self, DEFAULT_LAST_TID_KEY, OID_KEY_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Largest LMDB map size accepted by `validate`, in megabytes (16 TiB).
pub const MAX_MAP_SIZE_MB: usize = 16 * 1024 * 1024;

/// Which backing key-value store a cache is built on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Process-local in-memory store.
    Memory,
    /// LMDB environment at `path`, sized to `map_size_mb` megabytes.
    Lmdb { path: PathBuf, map_size_mb: usize },
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Memory => BackendKind::Memory,
            BackendConfig::Lmdb { .. } => BackendKind::Lmdb,
        }
    }
}

/// Backend discriminant, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Lmdb,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Lmdb => write!(f, "lmdb"),
        }
    }
}

/// How long non-current revisions are kept in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep every non-current revision until `clear` or restart.
    Unbounded,
    /// Keep at most `max` revisions per object, dropping the oldest first.
    MaxRevisionsPerOid { max: usize },
}

impl RetentionPolicy {
    /// Revision cap per object, if any.
    pub fn limit(&self) -> Option<usize> {
        match self {
            RetentionPolicy::Unbounded => None,
            RetentionPolicy::MaxRevisionsPerOid { max } => Some(*max),
        }
    }
}

/// Master configuration for a revision cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub backend: BackendConfig,
    /// Reserved store key holding the persisted last-known TID.
    #[serde(default = "default_last_tid_key")]
    pub last_tid_key: String,
    #[serde(default = "default_retention")]
    pub retention: RetentionPolicy,
    /// Delete a current slot that fails to decode instead of only reporting
    /// a miss.
    #[serde(default = "default_evict_malformed")]
    pub evict_malformed: bool,
}

fn default_last_tid_key() -> String {
    DEFAULT_LAST_TID_KEY.to_string()
}

fn default_retention() -> RetentionPolicy {
    RetentionPolicy::Unbounded
}

fn default_evict_malformed() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            last_tid_key: default_last_tid_key(),
            retention: default_retention(),
            evict_malformed: default_evict_malformed(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values (in-memory backend).
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an LMDB backend.
    pub fn with_lmdb(mut self, path: impl Into<PathBuf>, map_size_mb: usize) -> Self {
        self.backend = BackendConfig::Lmdb {
            path: path.into(),
            map_size_mb,
        };
        self
    }

    /// Set the reserved watermark key.
    pub fn with_last_tid_key(mut self, key: impl Into<String>) -> Self {
        self.last_tid_key = key.into();
        self
    }

    /// Set the non-current retention policy.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Enable or disable eviction of undecodable current slots.
    pub fn with_evict_malformed(mut self, enabled: bool) -> Self {
        self.evict_malformed = enabled;
        self
    }

    /// Parse a config from TOML source and validate it.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - last_tid_key is a legal store key that can never be an entry key
    /// - a revision cap, if set, is at least 1
    /// - LMDB path is non-empty and map size is positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !key::is_valid_store_key(&self.last_tid_key) {
            return Err(ConfigError::InvalidValue {
                field: "last_tid_key".to_string(),
                value: format!("{:?}", self.last_tid_key),
                reason: "must be 1-250 bytes without whitespace or control characters"
                    .to_string(),
            });
        }
        if self.last_tid_key.starts_with(OID_KEY_PREFIX) {
            return Err(ConfigError::InvalidValue {
                field: "last_tid_key".to_string(),
                value: self.last_tid_key.clone(),
                reason: format!("must not start with the entry key prefix {OID_KEY_PREFIX:?}"),
            });
        }

        if let RetentionPolicy::MaxRevisionsPerOid { max } = self.retention {
            if max == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "retention.max".to_string(),
                    value: max.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if let BackendConfig::Lmdb { path, map_size_mb } = &self.backend {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "backend.path".to_string(),
                    value: String::new(),
                    reason: "must not be empty".to_string(),
                });
            }
            if *map_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "backend.map_size_mb".to_string(),
                    value: map_size_mb.to_string(),
                    reason: "must be > 0".to_string(),
                });
            }
            if *map_size_mb > MAX_MAP_SIZE_MB {
                return Err(ConfigError::InvalidValue {
                    field: "backend.map_size_mb".to_string(),
                    value: map_size_mb.to_string(),
                    reason: format!("must be <= {MAX_MAP_SIZE_MB}"),
                });
            }
        }

        Ok(())
    }
}
