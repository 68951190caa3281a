//! Proof of possession using HMAC-SHA256
//!
//! A prover shows it holds a token by answering a verifier-chosen challenge.
//! The token never crosses the wire; only the truncated MAC does.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{CryptoError, Token, encoding::decode_fixed};

type HmacSha256 = Hmac<Sha256>;

/// Proof size (8 bytes, 16 hex characters on the wire)
pub const PROOF_SIZE: usize = 8;

/// A truncated HMAC over a challenge.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Proof([u8; PROOF_SIZE]);

impl Proof {
    /// Wrap raw proof bytes.
    pub fn from_bytes(bytes: [u8; PROOF_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a proof from its hex wire form.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        decode_fixed("proof", text).map(Self)
    }

    /// Raw proof bytes.
    pub fn as_bytes(&self) -> &[u8; PROOF_SIZE] {
        &self.0
    }

    /// Lowercase hex wire form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({})", self.to_hex())
    }
}

/// Keyed by the token's hex text, as both sides hold it on the wire.
fn mac_for(token: &Token, challenge: &str) -> HmacSha256 {
    let Ok(mut mac) = HmacSha256::new_from_slice(token.to_hex().as_bytes()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(challenge.as_bytes());
    mac
}

/// Answer `challenge` with proof of holding `token`.
pub fn create_proof(token: &Token, challenge: &str) -> Proof {
    let tag = mac_for(token, challenge).finalize().into_bytes();

    let mut out = [0u8; PROOF_SIZE];
    out.copy_from_slice(&tag[..PROOF_SIZE]);
    Proof(out)
}

/// Check a proof against the token the verifier expects.
///
/// Comparison is constant-time. A proof made for one challenge never
/// validates against another.
pub fn validate_proof(expected: &Token, challenge: &str, proof: &Proof) -> bool {
    let recomputed = create_proof(expected, challenge);
    recomputed.0.ct_eq(&proof.0).into()
}
