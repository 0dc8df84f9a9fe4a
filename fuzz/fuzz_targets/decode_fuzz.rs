//! Fuzz test for decoding untrusted identifiers
//!
//! Decoding arbitrary text must never panic. Whatever decodes must encode
//! back to a string that decodes to the same value.
//!
//! Run with: cargo +nightly fuzz run decode_fuzz -- -max_total_time=60

#![no_main]

use draco_core::{decode, decode_components, encode_reversible, Backend};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = decode_components(input);

        if let Ok(decoded) = decode(input) {
            if decoded.contains('\u{FFFF}') {
                return;
            }
            let profile = Backend::PostgreSql.profile();
            let reencoded = encode_reversible(&decoded, &profile);
            assert_eq!(decode(&reencoded).as_deref(), Ok(decoded.as_str()));
        }
    }
});
