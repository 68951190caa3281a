//! Per-request access tokens using HKDF-SHA256

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{CryptoError, MasterKey, encoding::decode_fixed};

/// Token size (16 bytes, 32 hex characters on the wire)
pub const TOKEN_SIZE: usize = 16;

/// Number of hex characters shown when a token is logged or debug-printed.
const LOG_PREFIX_CHARS: usize = 8;

/// An ephemeral access credential.
///
/// Tokens are exchanged in the clear (as lowercase hex) and are single-use,
/// so they are not secret-equivalent. `Debug` still prints only a prefix to
/// keep full values out of logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token([u8; TOKEN_SIZE]);

impl Token {
    /// Wrap raw token bytes.
    pub fn from_bytes(bytes: [u8; TOKEN_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a token from its hex wire form.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        decode_fixed("token", text).map(Self)
    }

    /// Raw token bytes.
    pub fn as_bytes(&self) -> &[u8; TOKEN_SIZE] {
        &self.0
    }

    /// Lowercase hex wire form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for log lines.
    pub fn log_prefix(&self) -> String {
        let mut text = self.to_hex();
        text.truncate(LOG_PREFIX_CHARS);
        text
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}..)", self.log_prefix())
    }
}

/// Derive a token from the master key.
///
/// Extract mixes `salt` with the master key into a pseudorandom key; expand
/// stretches it with `info` and truncates to [`TOKEN_SIZE`]. Callers bind the
/// time window through `salt` and every other request field through `info`.
///
/// # Security
///
/// - Deterministic: two parties with the same master key and inputs agree
/// - Any change to `salt` or `info` yields an unrelated token
pub fn derive_token(master_key: &MasterKey, salt: &[u8], info: &[u8]) -> Token {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), master_key.as_bytes());

    let mut okm = [0u8; TOKEN_SIZE];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("16 bytes is a valid HKDF-SHA256 output length");
    };

    Token(okm)
}
