//! Fuzz target for the event gate under audit-store failures
//!
//! Drives an `EventGate` with arbitrary session commands, clock jumps and
//! events while a `ChaoticAuditStore` fails a fuzzer-chosen share of
//! operations. Paths never exist on disk, so every allowed write is recorded
//! as a vanished-file delete.
//!
//! # Invariants
//!
//! - The gate NEVER panics on store errors
//! - An allowed event always has its record in the trail
//! - A locked session never yields an allow
//! - Store failures are reported as `StoreUnavailable`, never as allows
//! - A failed decision leaves the trail exactly as it was

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use keygate_core::{DenyReason, FsEvent, SessionConfig, SessionHandle};
use keygate_crypto::MasterKey;
use keygate_harness::SimEnv;
use keygate_monitor::{ChaoticAuditStore, Decision, EventGate, GateConfig, MemoryAuditStore};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    /// Seed for the sim RNG and the chaos RNG
    seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Unlock,
    Renew,
    Lock,
    Advance { secs: u16 },
    Create { file: u8 },
    Modify { file: u8 },
    Delete { file: u8 },
    Move { src: u8, dest: u8 },
}

fn path(file: u8) -> String {
    format!("/nonexistent/keygate-fuzz/{}", file % 8)
}

fuzz_target!(|scenario: Scenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;

    let env = SimEnv::with_seed(scenario.seed);
    let session = SessionHandle::new(env.clone(), SessionConfig::default());
    let store = ChaoticAuditStore::with_seed(MemoryAuditStore::new(), failure_rate, scenario.seed);
    let mut gate = EventGate::new(session, store, GateConfig::default());
    let master = MasterKey::from_bytes([7; 32]);

    for op in scenario.operations.into_iter().take(256) {
        let event = match op {
            Operation::Unlock => {
                gate.session().unlock(&master);
                continue;
            },
            Operation::Renew => {
                gate.session().renew();
                continue;
            },
            Operation::Lock => {
                gate.session().lock();
                continue;
            },
            Operation::Advance { secs } => {
                env.advance(Duration::from_secs(u64::from(secs)));
                continue;
            },
            Operation::Create { file } => FsEvent::Create(path(file)),
            Operation::Modify { file } => FsEvent::Modify(path(file)),
            Operation::Delete { file } => FsEvent::Delete(path(file)),
            Operation::Move { src, dest } => FsEvent::Moved { src: path(src), dest: path(dest) },
        };

        let valid = gate.session().is_valid();
        let before = gate.store().inner().event_count();
        let outcome = gate.decide(&event);
        let after = gate.store().inner().event_count();

        match outcome.decision {
            Decision::Allowed => {
                assert!(valid, "allowed while locked: {event}");
                assert_eq!(after, before + 1);
                assert!(outcome.record.is_some());
            },
            Decision::Denied(DenyReason::SessionLocked) => {
                assert!(!valid);
                assert_eq!(after, before + 1, "blocked event must be recorded");
            },
            Decision::Denied(DenyReason::StoreUnavailable) => {
                assert!(outcome.record.is_none());
                assert_eq!(after, before, "failed decision left a partial write");
            },
            Decision::Denied(other) => panic!("gate produced token-level denial {other:?}"),
        }
    }

    let stats = gate.stats();
    assert_eq!(stats.suspicious, 0, "nothing on disk to analyse");
});
