//! Shannon entropy over byte content.
//!
//! Encrypted and compressed data approaches 8 bits/byte; text sits around
//! 4-5. The gate flags content above a configured threshold.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default "likely encrypted" threshold in bits/byte
pub const DEFAULT_ENCRYPTION_THRESHOLD: f64 = 7.5;

/// Shannon entropy of `bytes` in bits per byte, in `0.0..=8.0`.
///
/// Empty input has entropy 0.
pub fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }

    let len = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum::<f64>()
        .clamp(0.0, 8.0)
}

/// Whether `entropy` crosses the encrypted-like threshold (strictly above).
pub fn is_encrypted_like(entropy: f64, threshold: f64) -> bool {
    entropy > threshold
}

/// Entropy band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntropyClass {
    /// Below 4.0: repetitive or sparse
    Low,
    /// 4.0 up to 6.0: text or code
    Normal,
    /// 6.0 up to and including 7.5: compressed or packed
    High,
    /// Above 7.5: likely encrypted
    VeryHigh,
}

impl EntropyClass {
    /// Band for an entropy value.
    pub fn classify(entropy: f64) -> Self {
        if entropy < 4.0 {
            Self::Low
        } else if entropy < 6.0 {
            Self::Normal
        } else if entropy <= DEFAULT_ENCRYPTION_THRESHOLD {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low (repetitive)",
            Self::Normal => "Normal (text/code)",
            Self::High => "High (compressed)",
            Self::VeryHigh => "Very High (likely encrypted)",
        }
    }
}

impl fmt::Display for EntropyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn english_460() -> Vec<u8> {
        let mut text = "The quick brown fox jumps over the lazy dog. ".repeat(11).into_bytes();
        text.truncate(460);
        text
    }

    #[test]
    fn all_zero_buffer_has_zero_entropy() {
        assert_eq!(shannon_entropy(&[0u8; 1024]), 0.0);
    }

    #[test]
    fn empty_input_has_zero_entropy() {
        assert_eq!(shannon_entropy(&[]), 0.0);
    }

    #[test]
    fn random_bytes_exceed_threshold() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);
        let mut buf = vec![0u8; 1000];
        rng.fill_bytes(&mut buf);

        let entropy = shannon_entropy(&buf);
        assert!(entropy > 7.5, "entropy {entropy}");
        assert_eq!(EntropyClass::classify(entropy), EntropyClass::VeryHigh);
    }

    #[test]
    fn english_text_is_normal() {
        let text = english_460();
        assert_eq!(text.len(), 460);

        let entropy = shannon_entropy(&text);
        assert!(entropy > 4.0 && entropy < 6.0, "entropy {entropy}");
        assert_eq!(EntropyClass::classify(entropy), EntropyClass::Normal);
    }

    #[test]
    fn every_byte_once_is_exactly_eight() {
        let all: Vec<u8> = (0..=255).collect();
        assert!((shannon_entropy(&all) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn two_symbols_is_one_bit() {
        assert!((shannon_entropy(b"abababab") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn band_edges() {
        assert_eq!(EntropyClass::classify(3.99), EntropyClass::Low);
        assert_eq!(EntropyClass::classify(4.0), EntropyClass::Normal);
        assert_eq!(EntropyClass::classify(6.0), EntropyClass::High);
        assert_eq!(EntropyClass::classify(7.5), EntropyClass::High);
        assert_eq!(EntropyClass::classify(7.51), EntropyClass::VeryHigh);
        assert!(!is_encrypted_like(7.5, DEFAULT_ENCRYPTION_THRESHOLD));
        assert!(is_encrypted_like(7.51, DEFAULT_ENCRYPTION_THRESHOLD));
    }

    proptest! {
        #[test]
        fn entropy_is_within_bounds(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
            let entropy = shannon_entropy(&bytes);
            prop_assert!((0.0..=8.0 + 1e-9).contains(&entropy));
        }

        #[test]
        fn entropy_ignores_byte_order(mut bytes in prop::collection::vec(any::<u8>(), 1..512)) {
            let before = shannon_entropy(&bytes);
            bytes.reverse();
            prop_assert!((before - shannon_entropy(&bytes)).abs() < 1e-9);
        }
    }
}
