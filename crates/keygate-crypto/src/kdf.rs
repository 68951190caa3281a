//! Master key derivation using Argon2id
//!
//! # Security Properties
//!
//! - Memory-hard: cost is dominated by `memory_cost_kib`, which resists
//!   GPU/ASIC guessing of the human secret
//! - Deterministic: same (secret, salt, params) always yields the same key
//! - Salt-bound: the same secret under a different salt yields an unrelated key
//! - Verification compares keys in constant time

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::{CryptoError, encoding::decode_fixed};

/// Master key size (32 bytes)
pub const MASTER_KEY_SIZE: usize = 32;

/// Salt size (32 bytes)
pub const SALT_SIZE: usize = 32;

/// Argon2id lanes. Fixed at 1.
const PARALLELISM: u32 = 1;

/// Default Argon2id iterations
pub const DEFAULT_TIME_COST: u32 = 2;

/// Default Argon2id memory in KiB (64 MiB)
pub const DEFAULT_MEMORY_COST_KIB: u32 = 65_536;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Number of passes over memory
    pub time_cost: u32,
    /// Memory size in KiB
    pub memory_cost_kib: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { time_cost: DEFAULT_TIME_COST, memory_cost_kib: DEFAULT_MEMORY_COST_KIB }
    }
}

impl KdfParams {
    /// Reject zero costs and memory below the Argon2 floor.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.time_cost == 0 {
            return Err(CryptoError::InvalidCost { parameter: "time_cost", value: self.time_cost });
        }

        if self.memory_cost_kib < Params::MIN_M_COST {
            return Err(CryptoError::InvalidCost {
                parameter: "memory_cost_kib",
                value: self.memory_cost_kib,
            });
        }

        Ok(())
    }
}

/// Random salt that must be stored alongside anything that needs
/// re-derivation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Wrap caller-supplied random bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a salt out of a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; SALT_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSaltLength { expected: SALT_SIZE, got: bytes.len() }
        })?;
        Ok(Self(array))
    }

    /// Parse a salt from its hex form.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        decode_fixed("salt", text).map(Self)
    }

    /// Raw salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_hex())
    }
}

/// A 32-byte master key derived from a human secret.
///
/// Held only in process memory. Zeroized on drop; `Debug` never prints the
/// key material.
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; MASTER_KEY_SIZE],
}

impl MasterKey {
    /// Wrap existing key material (e.g. a key derived elsewhere in tests).
    pub fn from_bytes(key: [u8; MASTER_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Raw key bytes. Keep the borrow short.
    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_SIZE] {
        &self.key
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Derive a master key from a secret and salt with Argon2id.
///
/// Parallelism is fixed at 1 and output length at 32 bytes.
///
/// # Errors
///
/// - `InvalidSaltLength` if `salt` is not [`SALT_SIZE`] bytes
/// - `InvalidCost` if a cost parameter is zero or below the Argon2 floor
/// - `Kdf` if Argon2 rejects the parameter set
pub fn derive_master_key(
    secret: &[u8],
    salt: &[u8],
    params: KdfParams,
) -> Result<MasterKey, CryptoError> {
    if salt.len() != SALT_SIZE {
        return Err(CryptoError::InvalidSaltLength { expected: SALT_SIZE, got: salt.len() });
    }
    params.validate()?;

    let argon_params = Params::new(
        params.memory_cost_kib,
        params.time_cost,
        PARALLELISM,
        Some(MASTER_KEY_SIZE),
    )?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = [0u8; MASTER_KEY_SIZE];
    argon2.hash_password_into(secret, salt, &mut key)?;

    Ok(MasterKey { key })
}

/// Re-derive the key for `secret` and compare it to `expected` in constant
/// time.
pub fn verify_master_key(
    secret: &[u8],
    salt: &[u8],
    params: KdfParams,
    expected: &MasterKey,
) -> Result<bool, CryptoError> {
    let derived = derive_master_key(secret, salt, params)?;
    Ok(derived.ct_eq(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so unit tests stay fast.
    fn fast_params() -> KdfParams {
        KdfParams { time_cost: 1, memory_cost_kib: 64 }
    }

    fn test_salt(fill: u8) -> [u8; SALT_SIZE] {
        [fill; SALT_SIZE]
    }

    #[test]
    fn derive_is_deterministic() {
        let key1 = derive_master_key(b"correct horse", &test_salt(1), fast_params()).unwrap();
        let key2 = derive_master_key(b"correct horse", &test_salt(1), fast_params()).unwrap();

        assert!(key1.ct_eq(&key2), "same inputs must produce same key");
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let key1 = derive_master_key(b"correct horse", &test_salt(1), fast_params()).unwrap();
        let key2 = derive_master_key(b"correct horse", &test_salt(2), fast_params()).unwrap();

        assert!(!key1.ct_eq(&key2), "different salts must produce different keys");
    }

    #[test]
    fn different_costs_produce_different_keys() {
        let slow = KdfParams { time_cost: 2, memory_cost_kib: 64 };
        let key1 = derive_master_key(b"correct horse", &test_salt(1), fast_params()).unwrap();
        let key2 = derive_master_key(b"correct horse", &test_salt(1), slow).unwrap();

        assert!(!key1.ct_eq(&key2));
    }

    #[test]
    fn verify_accepts_right_secret_and_rejects_wrong_one() {
        let salt = test_salt(7);
        let key = derive_master_key(b"MySecurePassword123!", &salt, fast_params()).unwrap();

        assert!(verify_master_key(b"MySecurePassword123!", &salt, fast_params(), &key).unwrap());
        assert!(!verify_master_key(b"WrongPassword", &salt, fast_params(), &key).unwrap());
    }

    #[test]
    fn short_salt_is_rejected() {
        let result = derive_master_key(b"secret", &[0u8; 16], fast_params());
        assert!(matches!(
            result,
            Err(CryptoError::InvalidSaltLength { expected: SALT_SIZE, got: 16 })
        ));
    }

    #[test]
    fn zero_time_cost_is_rejected() {
        let params = KdfParams { time_cost: 0, memory_cost_kib: 64 };
        let result = derive_master_key(b"secret", &test_salt(0), params);
        assert!(matches!(result, Err(CryptoError::InvalidCost { parameter: "time_cost", .. })));
    }

    #[test]
    fn zero_memory_cost_is_rejected() {
        let params = KdfParams { time_cost: 1, memory_cost_kib: 0 };
        let result = derive_master_key(b"secret", &test_salt(0), params);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidCost { parameter: "memory_cost_kib", .. })
        ));
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = MasterKey::from_bytes([0x42; MASTER_KEY_SIZE]);
        let printed = format!("{key:?}");
        assert!(!printed.contains("42"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn salt_from_slice_checks_length() {
        assert!(Salt::from_slice(&[0u8; SALT_SIZE]).is_ok());
        assert_eq!(
            Salt::from_slice(&[0u8; 31]),
            Err(CryptoError::InvalidSaltLength { expected: SALT_SIZE, got: 31 })
        );
    }

    #[test]
    fn salt_hex_roundtrip() {
        let salt = Salt::from_bytes([0x5A; SALT_SIZE]);
        assert_eq!(Salt::from_hex(&salt.to_hex()).unwrap(), salt);
    }
}
