//! Test fixtures: file contents with known entropy and cheap key material.

use keygate_crypto::{KdfParams, MasterKey, derive_master_key};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Plain English prose; entropy around 4.2 bits per byte.
pub const PROSE: &str = "The quarterly report covers revenue, staffing and the \
    office move. Sales rose in the north and west regions while the south held \
    steady. Please review the attached figures before the meeting on Thursday \
    and send any corrections to the finance team by the end of the week. ";

/// Argon2id costs small enough for tests (1 pass, 64 KiB).
pub fn fast_kdf() -> KdfParams {
    KdfParams { time_cost: 1, memory_cost_kib: 64 }
}

/// Master key derived from `secret` with [`fast_kdf`] and a fixed salt.
///
/// # Panics
///
/// Never for the fixed parameters used here.
#[allow(clippy::expect_used)]
pub fn master_key(secret: &str) -> MasterKey {
    derive_master_key(secret.as_bytes(), &[0x5A; 32], fast_kdf())
        .expect("invariant: fixed test parameters are valid")
}

/// `len` bytes of repeated [`PROSE`]: low entropy, human-readable content.
pub fn prose(len: usize) -> Vec<u8> {
    PROSE.bytes().cycle().take(len).collect()
}

/// `len` bytes from a seeded ChaCha stream: stands in for ciphertext.
pub fn ciphertext_like(seed: u64, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    ChaCha8Rng::seed_from_u64(seed).fill_bytes(&mut buf);
    buf
}
