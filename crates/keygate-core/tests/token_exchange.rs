//! Requester/verifier exchange with a real Argon2id master key.

use std::time::Duration;

use keygate_core::{
    DenyReason, MemoryUsedTokens, Operation, TimeWindow, TokenRequest, generate_token,
    validate_token,
};
use keygate_crypto::{KdfParams, Nonce, create_proof, derive_master_key, validate_proof};

fn fast_params() -> KdfParams {
    KdfParams { time_cost: 1, memory_cost_kib: 64 }
}

#[test]
fn both_sides_agree_and_token_is_single_use() {
    let salt = [0x24u8; 32];
    let requester_key = derive_master_key(b"MySecurePassword123!", &salt, fast_params()).unwrap();
    let verifier_key = derive_master_key(b"MySecurePassword123!", &salt, fast_params()).unwrap();

    let window = TimeWindow::containing(1_700_000_123, Duration::from_secs(300));
    let request = TokenRequest {
        client_nonce: Nonce::from_hex("000102030405060708090a0b0c0d0e0f").unwrap(),
        server_nonce: Nonce::from_hex("f0e0d0c0b0a090807060504030201000").unwrap(),
        window,
        path: "/srv/finance/ledger.xlsx".to_string(),
        operation: Operation::Write,
    };

    // The requester only sends the hex token; the verifier parses it back.
    let sent = generate_token(&requester_key, &request).to_hex();
    let received = keygate_crypto::Token::from_hex(&sent).unwrap();

    let used = MemoryUsedTokens::new();
    let granted = validate_token(&received, &request, &verifier_key, window, &used).unwrap();
    assert_eq!(granted.token, received);

    assert_eq!(
        validate_token(&received, &request, &verifier_key, window, &used),
        Err(DenyReason::AlreadyUsed)
    );
}

#[test]
fn possession_proof_without_sending_token() {
    let key = derive_master_key(b"hunter2", &[7u8; 32], fast_params()).unwrap();
    let request = TokenRequest {
        client_nonce: Nonce::from_bytes([1; 16]),
        server_nonce: Nonce::from_bytes([2; 16]),
        window: TimeWindow::from_start(1_700_000_100),
        path: "/srv".to_string(),
        operation: Operation::Read,
    };
    let token = generate_token(&key, &request);

    let proof = create_proof(&token, "challenge-a");
    assert!(validate_proof(&token, "challenge-a", &proof));
    assert!(!validate_proof(&token, "challenge-b", &proof));
}

#[test]
fn wrong_secret_derives_unusable_tokens() {
    let salt = [9u8; 32];
    let right = derive_master_key(b"right", &salt, fast_params()).unwrap();
    let wrong = derive_master_key(b"wrong", &salt, fast_params()).unwrap();

    let window = TimeWindow::from_start(1_700_000_100);
    let request = TokenRequest {
        client_nonce: Nonce::from_bytes([3; 16]),
        server_nonce: Nonce::from_bytes([4; 16]),
        window,
        path: "/srv".to_string(),
        operation: Operation::Write,
    };

    let forged = generate_token(&wrong, &request);
    let used = MemoryUsedTokens::new();
    assert_eq!(validate_token(&forged, &request, &right, window, &used), Err(DenyReason::Mismatch));
}
