//! Fuzz test for reversible identifier encoding
//!
//! Arbitrary UTF-8 input is encoded for every backend profile and must decode
//! back to the input using only the profile's alphabet. U+FFFF is the one
//! lossy character.
//!
//! Run with: cargo +nightly fuzz run encoding_fuzz -- -max_total_time=60

#![no_main]

use draco_core::{decode, encode_reversible, Backend, CONCATENATOR};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.contains('\u{FFFF}') {
            return;
        }

        for backend in Backend::ALL {
            let profile = backend.profile();
            let encoded = encode_reversible(input, &profile);

            assert!(
                encoded.chars().all(|c| profile.allows(c)),
                "{} produced a disallowed character in {:?}",
                backend,
                encoded
            );
            assert!(
                !encoded.contains(CONCATENATOR),
                "Separator token leaked into a component: {:?}",
                encoded
            );
            assert_eq!(decode(&encoded).as_deref(), Ok(input), "Round trip failed for {:?}", input);
        }
    }
});
