//! Fuzz test for the cache entry decoder
//!
//! Feeds arbitrary bytes to `CacheEntry::decode` to find:
//! - Panics or crashes on malformed input
//! - Oversized allocations from hostile length prefixes
//! - Buffers that decode but do not re-encode to the same bytes
//!
//! Run with: cargo +nightly fuzz run entry_decode_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use revcache_core::CacheEntry;

fuzz_target!(|data: &[u8]| {
    // Decode must reject bad input with an error, never a panic.
    if let Ok(entry) = CacheEntry::decode(data) {
        // Anything accepted is canonical: padding is zero and nothing
        // trails the last field, so re-encoding reproduces the input.
        let encoded = entry.encode().expect("decoded payload fits in u32");
        assert_eq!(encoded, data, "decode accepted a non-canonical buffer");
    }
});
