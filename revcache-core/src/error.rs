//! Error types for revcache operations

use crate::{Oid, Tid};
use thiserror::Error;

/// Failures reported by a backing key-value store.
///
/// These are never masked by the cache: an unreachable store is an outage,
/// not an empty cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Backing store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Backing store operation {operation} failed: {reason}")]
    Backend {
        operation: &'static str,
        reason: String,
    },

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Entry codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("Truncated entry: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Expected {expected} fields, found {found}")]
    FieldCount { expected: u32, found: u32 },

    #[error("Field {field} has length {len}, expected {expected}")]
    FieldWidth {
        field: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("Non-zero padding after field {field}")]
    Padding { field: &'static str },

    #[error("{count} trailing bytes after last field")]
    TrailingBytes { count: usize },

    #[error("Field {field} too large to encode: {len} bytes")]
    TooLarge { field: &'static str, len: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("No cache constructor registered for backend {backend}")]
    BackendNotRegistered { backend: String },
}

/// Master error type for all revcache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// A transaction-id ordering invariant was violated. Signals a
    /// consistency bug upstream and is never retried.
    #[error("{operation}: tid {attempted} must be greater than last tid {last}")]
    OrderingViolation {
        operation: &'static str,
        attempted: Tid,
        last: Tid,
    },

    /// A second, different current revision was stored for an object.
    #[error("Already have current data for oid {oid}: cached start tid {existing}, attempted {attempted}")]
    CurrentRevisionConflict {
        oid: Oid,
        existing: Tid,
        attempted: Tid,
    },

    #[error("Malformed cache entry: {0}")]
    MalformedEntry(#[from] EntryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
