//! Fuzz target for hex wire decoding
//!
//! Tokens, nonces, proofs and salts arrive as hex text from the CLI and from
//! peers. Decoding must reject anything malformed without panicking.
//!
//! # Invariants
//!
//! - `from_hex` NEVER panics
//! - A successful decode re-encodes to the lowercase input
//! - Token comparison is reflexive after decoding

#![no_main]

use keygate_crypto::{Nonce, Proof, Salt, Token, create_proof, validate_proof};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let lower = text.to_ascii_lowercase();

    if let Ok(token) = Token::from_hex(text) {
        assert_eq!(token.to_hex(), lower);
        assert!(token.ct_eq(&token));

        let proof = create_proof(&token, text);
        assert!(validate_proof(&token, text, &proof));
    }

    if let Ok(nonce) = Nonce::from_hex(text) {
        assert_eq!(nonce.to_hex(), lower);
    }

    if let Ok(proof) = Proof::from_hex(text) {
        assert_eq!(proof.to_hex(), lower);
    }

    if let Ok(salt) = Salt::from_hex(text) {
        assert_eq!(salt.to_hex(), lower);
    }
});
