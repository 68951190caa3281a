//! Keygate Cryptographic Primitives
//!
//! Cryptographic building blocks for Keygate. Pure functions with
//! deterministic outputs. Callers provide salts, nonces and challenges, so
//! nothing in this crate touches a clock or an RNG.
//!
//! # Key Lifecycle
//!
//! A human secret is stretched once into a master key. Every access request
//! then derives a short-lived token bound to the request's nonces, time window,
//! path and operation. The token itself is never sent when proving possession;
//! only an HMAC over a verifier-chosen challenge is.
//!
//! ```text
//! Secret + Salt
//!        │
//!        ▼
//! Argon2id → Master Key (per secret, per salt)
//!        │
//!        ▼
//! HKDF(salt = window, info = request) → Token
//!        │
//!        ▼
//! HMAC(key = token, challenge) → Proof
//! ```
//!
//! # Security
//!
//! Secret Handling:
//! - Master keys are zeroized on drop and never printed
//! - Key comparison is constant-time
//!
//! Token Binding:
//! - Every field of the request is part of the HKDF info or salt
//! - Two parties holding the same master key derive byte-identical tokens
//!
//! Proof Binding:
//! - A proof is valid for exactly one challenge
//! - Proof comparison is constant-time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod encoding;
mod error;
pub mod kdf;
pub mod proof;
pub mod token;

pub use encoding::{NONCE_SIZE, Nonce};
pub use error::CryptoError;
pub use kdf::{
    KdfParams, MASTER_KEY_SIZE, MasterKey, SALT_SIZE, Salt, derive_master_key, verify_master_key,
};
pub use proof::{PROOF_SIZE, Proof, create_proof, validate_proof};
pub use token::{TOKEN_SIZE, Token, derive_token};
