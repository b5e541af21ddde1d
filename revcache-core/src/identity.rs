//! Identity types for cached objects and transactions.
//!
//! Both identifiers are fixed-width 8-byte values on the wire. They are held
//! as `u64` decoded big-endian, so the derived ordering is exactly the
//! unsigned big-endian ordering the host database uses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width in bytes of an encoded [`Oid`] or [`Tid`].
pub const ID_WIDTH: usize = 8;

/// Object identifier in the host database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid(u64);

impl Oid {
    /// Create an OID from its integer form.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Create an OID from its 8-byte wire form.
    pub const fn from_bytes(bytes: [u8; ID_WIDTH]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Parse an OID from a slice, which must be exactly 8 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ID_WIDTH] = bytes.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    /// The 8-byte wire form.
    pub const fn to_bytes(self) -> [u8; ID_WIDTH] {
        self.0.to_be_bytes()
    }

    /// The integer form.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Oid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Transaction identifier. Monotonically increasing over the life of the
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tid(u64);

impl Tid {
    /// The "zero" sentinel. Stored as the end TID of a revision that is
    /// still current.
    pub const ZERO: Tid = Tid(0);

    /// Create a TID from its integer form.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Create a TID from its 8-byte wire form.
    pub const fn from_bytes(bytes: [u8; ID_WIDTH]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Parse a TID from a slice, which must be exactly 8 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ID_WIDTH] = bytes.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    /// The 8-byte wire form.
    pub const fn to_bytes(self) -> [u8; ID_WIDTH] {
        self.0.to_be_bytes()
    }

    /// The integer form.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is the zero sentinel.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Tid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}
