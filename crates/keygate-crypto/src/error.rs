//! Crypto error types.

use thiserror::Error;

/// Errors from key derivation and wire decoding.
///
/// These are caller contract violations (malformed salt, non-positive cost,
/// malformed hex). None of them is transient: fix the input, do not retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Salt is not exactly [`crate::SALT_SIZE`] bytes
    #[error("invalid salt length: expected {expected} bytes, got {got}")]
    InvalidSaltLength {
        /// Required salt length
        expected: usize,
        /// Provided salt length
        got: usize,
    },

    /// A KDF cost parameter is zero or below the Argon2 minimum
    #[error("invalid {parameter}: {value}")]
    InvalidCost {
        /// Name of the rejected parameter
        parameter: &'static str,
        /// Rejected value
        value: u32,
    },

    /// Argon2 rejected the parameter set or failed to hash
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Wire value is not valid lowercase hex
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex {
        /// Which value failed to decode
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Wire value decoded to the wrong number of bytes
    #[error("invalid {field} length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Which value had the wrong length
        field: &'static str,
        /// Required length in bytes
        expected: usize,
        /// Decoded length in bytes
        got: usize,
    },
}

impl From<argon2::Error> for CryptoError {
    fn from(err: argon2::Error) -> Self {
        Self::Kdf(err.to_string())
    }
}
