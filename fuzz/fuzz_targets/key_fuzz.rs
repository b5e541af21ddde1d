//! Fuzz test for the store key mapper
//!
//! Checks that `from_key` never panics and only accepts keys that
//! `to_key` would produce.
//!
//! Run with: cargo +nightly fuzz run key_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use revcache_core::{from_key, to_key};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Some(oid) = from_key(input) {
            assert_eq!(to_key(oid), input, "from_key accepted a non-canonical key");
        }
    }
});
