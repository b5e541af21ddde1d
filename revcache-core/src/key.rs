//! Mapping from object ids to backing-store keys.
//!
//! Memcache-style key spaces reject whitespace and control characters, so an
//! OID is never used raw. Keys are `oid:` followed by the 16 lowercase hex
//! digits of the OID's wire bytes: fixed width, ASCII only, and trivially
//! invertible.

use crate::{Oid, ID_WIDTH};

/// Prefix of every entry key.
pub const OID_KEY_PREFIX: &str = "oid:";

/// Default reserved key holding the persisted last-known TID.
pub const DEFAULT_LAST_TID_KEY: &str = "LAST_TID";

/// Map an OID to its backing-store key.
pub fn to_key(oid: Oid) -> String {
    let mut key = String::with_capacity(OID_KEY_PREFIX.len() + 2 * ID_WIDTH);
    key.push_str(OID_KEY_PREFIX);
    key.push_str(&hex::encode(oid.to_bytes()));
    key
}

/// Recover the OID from an entry key.
///
/// Returns `None` for keys this module did not produce, including the
/// reserved watermark key.
pub fn from_key(key: &str) -> Option<Oid> {
    let digits = key.strip_prefix(OID_KEY_PREFIX)?;
    if digits.len() != 2 * ID_WIDTH || digits.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let mut bytes = [0u8; ID_WIDTH];
    hex::decode_to_slice(digits, &mut bytes).ok()?;
    Some(Oid::from_bytes(bytes))
}

/// Whether `key` is an entry key.
pub fn is_entry_key(key: &str) -> bool {
    from_key(key).is_some()
}

/// Whether `key` is usable in a memcache-style key space: non-empty, at
/// most 250 bytes, and free of whitespace and control characters.
pub fn is_valid_store_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 250
        && !key.chars().any(|c| c.is_whitespace() || c.is_control())
}
