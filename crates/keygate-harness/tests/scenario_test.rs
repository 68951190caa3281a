//! End-to-end scenarios under simulated time.
//!
//! Each scenario drives a real gate against real files in a temporary
//! directory, with the session clock and nonces supplied by `SimEnv`.

use std::{fs, time::Duration};

use keygate_core::{
    DenyReason, EventKind, FsEvent, MemoryUsedTokens, Operation, SessionConfig, SessionHandle,
    TokenValidator, parse_feed_line,
};
use keygate_harness::{
    AuditSnapshot, InvariantRegistry, SimEnv,
    fixtures::{ciphertext_like, master_key, prose},
};
use keygate_monitor::{
    AuditStore, Decision, EventGate, GateConfig, MemoryAuditStore, Monitor, MonitorInput,
    MonitorReport,
};
use tempfile::TempDir;

struct World {
    dir: TempDir,
    env: SimEnv,
    gate: EventGate<SimEnv, MemoryAuditStore>,
}

impl World {
    fn new(seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        let session = SessionHandle::new(env.clone(), SessionConfig::default());
        let gate = EventGate::new(session, MemoryAuditStore::new(), GateConfig::default());
        Self { dir: tempfile::tempdir().unwrap(), env, gate }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    fn write(&self, name: &str, content: &[u8]) -> String {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn unlock(&self) {
        self.gate.session().unlock(&master_key("scenario"));
    }

    fn assert_invariants(&self, context: &str) {
        let trail = self.gate.store().query_events(None, usize::MAX).unwrap();
        InvariantRegistry::standard().assert_all(&AuditSnapshot::from_newest_first(trail), context);
    }
}

#[test]
fn benign_create_then_encrypting_overwrite() {
    let mut world = World::new(1);
    world.unlock();

    let path = world.write("report.txt", &prose(2000));
    let created = world.gate.decide(&FsEvent::Create(path.clone()));

    assert_eq!(created.decision, Decision::Allowed);
    assert!(!created.suspicious_encryption);
    let first = created.record.unwrap();
    assert!(first.entropy_after.unwrap() < 6.0);
    let original_digest = first.digest_after;

    world.env.advance(Duration::from_secs(30));
    fs::write(&path, ciphertext_like(7, 4096)).unwrap();
    let overwritten = world.gate.decide(&FsEvent::Modify(path.clone()));

    assert_eq!(overwritten.decision, Decision::Allowed, "the heuristic signals, it does not block");
    assert!(overwritten.suspicious_encryption);
    let record = overwritten.record.unwrap();
    assert_eq!(record.digest_before, original_digest);
    assert!(record.entropy_after.unwrap() > 7.5);

    let state = world.gate.store().get_file_state(&path).unwrap().unwrap();
    assert_eq!(Some(state.digest), record.digest_after);
    assert_eq!(state.modified_at, state.created_at + 30);

    world.assert_invariants("after overwrite");
}

#[test]
fn short_random_overwrite_then_expired_delete() {
    let mut world = World::new(7);
    world.unlock();

    let path = world.write("f.txt", &prose(460));
    let created = world.gate.decide(&FsEvent::Create(path.clone()));
    assert_eq!(created.decision, Decision::Allowed);
    let state = world.gate.store().get_file_state(&path).unwrap().unwrap();
    assert!(state.entropy < 6.0);
    let d1 = state.digest;

    // 500 bytes sit close to the threshold (about 7.6 bits per byte).
    let random = ciphertext_like(2, 500);
    fs::write(&path, &random).unwrap();
    let overwritten = world.gate.decide(&FsEvent::Modify(path.clone()));

    assert_eq!(overwritten.decision, Decision::Allowed);
    assert!(overwritten.suspicious_encryption);
    let record = overwritten.record.unwrap();
    assert_eq!(record.digest_before, Some(d1));
    assert!(record.entropy_after.unwrap() > 7.5, "entropy {:?}", record.entropy_after);
    let after_overwrite = world.gate.store().get_file_state(&path).unwrap();

    world.env.advance(Duration::from_secs(601));
    fs::remove_file(&path).unwrap();
    let outcome = world.gate.decide(&FsEvent::Delete(path.clone()));

    assert_eq!(outcome.decision, Decision::Denied(DenyReason::SessionLocked));
    assert_eq!(outcome.record.unwrap().kind, EventKind::BlockedDelete);
    assert_eq!(world.gate.store().get_file_state(&path).unwrap(), after_overwrite);

    world.assert_invariants("after short random overwrite");
}

#[test]
fn expired_session_blocks_delete_and_keeps_state() {
    let mut world = World::new(2);
    world.unlock();

    let path = world.write("keep.txt", b"important");
    world.gate.decide(&FsEvent::Create(path.clone()));
    let before = world.gate.store().get_file_state(&path).unwrap();

    world.env.advance(Duration::from_secs(601));
    fs::remove_file(&path).unwrap();
    let outcome = world.gate.decide(&FsEvent::Delete(path.clone()));

    assert_eq!(outcome.decision, Decision::Denied(DenyReason::SessionLocked));
    assert_eq!(outcome.record.unwrap().kind, EventKind::BlockedDelete);
    assert_eq!(world.gate.store().get_file_state(&path).unwrap(), before);

    world.assert_invariants("after blocked delete");
}

#[test]
fn renewed_session_outlives_original_expiry() {
    let mut world = World::new(3);
    world.unlock();
    let path = world.write("a.txt", b"a");

    world.env.advance(Duration::from_secs(500));
    assert!(world.gate.session().renew());
    world.env.advance(Duration::from_secs(500));

    assert!(world.gate.decide(&FsEvent::Modify(path.clone())).decision.is_allowed());

    world.env.advance(Duration::from_secs(100));
    assert_eq!(
        world.gate.decide(&FsEvent::Modify(path)).decision,
        Decision::Denied(DenyReason::SessionLocked)
    );
}

#[test]
fn mass_encryption_with_rename_is_flagged() {
    let mut world = World::new(4);
    world.unlock();

    let originals: Vec<String> =
        (0..8).map(|i| world.write(&format!("doc{i}.txt"), &prose(1500 + i * 10))).collect();
    for path in &originals {
        world.gate.decide(&FsEvent::Create(path.clone()));
        world.env.advance(Duration::from_secs(2));
    }

    let mut flagged = Vec::new();
    for (i, src) in originals.iter().enumerate() {
        fs::write(src, ciphertext_like(i as u64, 4096)).unwrap();
        let dest = format!("{src}.locked");
        fs::rename(src, &dest).unwrap();

        let outcome = world.gate.decide(&FsEvent::Moved { src: src.clone(), dest });
        assert!(outcome.decision.is_allowed());
        flagged.push((
            outcome.suspicious_encryption,
            outcome.suspicious_extension,
            outcome.burst_detected,
        ));
    }

    assert!(flagged.iter().all(|(enc, ext, _)| *enc && *ext));
    assert!(flagged.iter().skip(5).all(|(_, _, burst)| *burst), "{flagged:?}");
    assert_eq!(world.gate.stats().suspicious, 8);

    for src in &originals {
        assert_eq!(world.gate.store().get_file_state(src).unwrap(), None);
    }
    world.assert_invariants("after mass rename");
}

#[test]
fn token_window_and_replay() {
    let env = SimEnv::with_seed(5);
    let validator = TokenValidator::new(env.clone(), Duration::from_secs(300));
    let used = MemoryUsedTokens::new();
    let master = master_key("protocol");

    let (request, token) = validator.issue(&master, "/srv/ledger.xlsx", Operation::Write);
    assert_eq!(validator.validate(&token, &request, &master, &used).map(|g| g.token), Ok(token));
    assert_eq!(
        validator.validate(&token, &request, &master, &used),
        Err(DenyReason::AlreadyUsed)
    );

    let (late_request, late_token) = validator.issue(&master, "/srv/ledger.xlsx", Operation::Write);
    env.advance(Duration::from_secs(300));
    assert_eq!(
        validator.validate(&late_token, &late_request, &master, &used),
        Err(DenyReason::Mismatch),
        "token from the previous window"
    );

    let (read_request, read_token) = validator.issue(&master, "/srv/ledger.xlsx", Operation::Read);
    let as_write = keygate_core::TokenRequest { operation: Operation::Write, ..read_request };
    assert_eq!(
        validator.validate(&read_token, &as_write, &master, &used),
        Err(DenyReason::Mismatch)
    );
}

#[tokio::test]
async fn monitor_processes_feed_in_order() {
    let world = World::new(6);
    let path = world.write("notes.md", &prose(800));

    let feed = [
        format!("MODIFY {path}"),
        "unlock".to_string(),
        format!("MODIFY {path}"),
        "lock".to_string(),
        format!("DELETE {path}"),
        "stats".to_string(),
    ];

    let World { dir: _dir, gate, .. } = world;
    let (monitor, handle, mut reports) = Monitor::new(gate, master_key("scenario"), 4);
    let runner = tokio::spawn(monitor.run());

    for line in &feed {
        let input = MonitorInput::from(parse_feed_line(line).unwrap());
        handle.submit(input).await.unwrap();
    }
    drop(handle);

    let stats = runner.await.unwrap();
    assert_eq!((stats.allowed, stats.blocked), (1, 2));

    let mut lines = Vec::new();
    while let Some(report) = reports.recv().await {
        lines.push(report);
    }

    let decisions: Vec<_> = lines
        .iter()
        .filter_map(|r| match r {
            MonitorReport::Outcome { outcome, .. } => Some(outcome.decision),
            _ => None,
        })
        .collect();
    assert_eq!(
        decisions,
        vec![
            Decision::Denied(DenyReason::SessionLocked),
            Decision::Allowed,
            Decision::Denied(DenyReason::SessionLocked),
        ]
    );
    assert_eq!(
        lines.last().map(ToString::to_string).as_deref(),
        Some("allowed=1 blocked=2 unreadable=0 failed=0 suspicious=0")
    );
}
