//! Fuzz target for the entropy classifier and content fingerprinter
//!
//! # Invariants
//!
//! - Entropy is always within [0, 8] bits per byte
//! - Fingerprinting is deterministic and records the full length
//! - The sample limit only affects entropy, never the digest

#![no_main]

use arbitrary::Arbitrary;
use keygate_core::{EntropyClass, fingerprint_bytes, shannon_entropy};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    sample_bytes: u16,
    content: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let entropy = shannon_entropy(&input.content);
    assert!((0.0..=8.0).contains(&entropy), "entropy {entropy}");
    let _ = EntropyClass::classify(entropy).label();

    let sample = usize::from(input.sample_bytes).max(1);
    let a = fingerprint_bytes(&input.content, sample);
    let b = fingerprint_bytes(&input.content, sample);
    assert_eq!(a, b);
    assert_eq!(a.size_bytes, input.content.len() as u64);

    let full = fingerprint_bytes(&input.content, usize::MAX);
    assert_eq!(a.digest, full.digest);
});
