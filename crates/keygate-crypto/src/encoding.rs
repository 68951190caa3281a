//! Lowercase-hex wire encoding for fixed-size values.

use std::fmt;

use crate::CryptoError;

/// Size of client and server nonces (16 bytes)
pub const NONCE_SIZE: usize = 16;

/// Decode a hex string into exactly `N` bytes.
///
/// Uppercase digits are accepted on input; everything this crate emits is
/// lowercase.
pub(crate) fn decode_fixed<const N: usize>(
    field: &'static str,
    text: &str,
) -> Result<[u8; N], CryptoError> {
    if text.len() % 2 != 0 {
        return Err(CryptoError::InvalidHex { field, reason: "odd number of digits".to_string() });
    }

    if text.len() / 2 != N {
        return Err(CryptoError::InvalidLength { field, expected: N, got: text.len() / 2 });
    }

    let mut out = [0u8; N];
    hex::decode_to_slice(text, &mut out)
        .map_err(|e| CryptoError::InvalidHex { field, reason: e.to_string() })?;
    Ok(out)
}

/// A 16-byte random nonce, exchanged as 32 lowercase hex characters.
///
/// Used for the client and server halves of a token request and for
/// possession-proof challenges.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Wrap caller-supplied random bytes.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a nonce from its hex wire form.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        decode_fixed("nonce", text).map(Self)
    }

    /// Raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Lowercase hex wire form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_hex())
    }
}
