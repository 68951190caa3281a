//! Event gate.
//!
//! Consumes file-system events, checks the access session at the instant of
//! each event, fingerprints permitted paths, and records every outcome in the
//! audit store.
//!
//! # Pipeline
//!
//! ```text
//! FsEvent ─> session valid? ─ no ──> commit BLOCKED_* ────────────────> Denied(SessionLocked)
//!                 │
//!                yes
//!                 │
//!                 ├─ file gone ─────> commit DELETE, remove state ────> Allowed
//!                 ├─ read fails ────> commit BLOCKED_* ───────────────> Denied(Unreadable)
//!                 └─ fingerprint ───> commit record + new state ──────> Allowed (+ flags)
//!
//! any store failure ───────────────────────────────────────────────────> Denied(StoreUnavailable)
//! ```
//!
//! Each record and its file-state change go to the store in one
//! [`AuditStore::commit_event`], so a failed commit leaves both the trail and
//! the states exactly as they were.

use std::{fmt, io, path::Path};

use keygate_core::{
    DenyReason, Environment, EventKind, EventRecord, FileState, Fingerprint, FsEvent,
    SessionHandle, fingerprint_file,
};

use crate::{AuditStore, BurstDetector, GateConfig, GateError, StateChange};

/// Extensions commonly appended by ransomware
const SUSPICIOUS_EXTENSIONS: &[&str] = &["encrypted", "locked", "crypto", "crypt", "enc"];

/// Allow/deny result for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Event was permitted and recorded
    Allowed,
    /// Event was refused
    Denied(DenyReason),
}

impl Decision {
    /// Whether the event was permitted.
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Everything the gate reports about one event.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    /// Allow or deny
    pub decision: Decision,
    /// Record appended to the audit trail (`None` if the store failed)
    pub record: Option<EventRecord>,
    /// New content entropy crossed the encryption threshold
    pub suspicious_encryption: bool,
    /// Created or destination path has a ransomware-style extension
    pub suspicious_extension: bool,
    /// Event arrived inside a burst
    pub burst_detected: bool,
    /// File was longer than the read cap and was digested by prefix
    pub truncated_read: bool,
}

impl GateOutcome {
    fn denied(reason: DenyReason) -> Self {
        Self {
            decision: Decision::Denied(reason),
            record: None,
            suspicious_encryption: false,
            suspicious_extension: false,
            burst_detected: false,
            truncated_read: false,
        }
    }
}

/// Running allow/block counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Events allowed
    pub allowed: u64,
    /// Events blocked by a locked session
    pub blocked: u64,
    /// Events denied because the file could not be read
    pub unreadable: u64,
    /// Events denied because the store failed
    pub failed: u64,
    /// Allowed events flagged for high entropy
    pub suspicious: u64,
}

impl GateStats {
    /// Total events seen.
    pub fn total(&self) -> u64 {
        self.allowed + self.blocked + self.unreadable + self.failed
    }
}

impl fmt::Display for GateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allowed={} blocked={} unreadable={} failed={} suspicious={}",
            self.allowed, self.blocked, self.unreadable, self.failed, self.suspicious
        )
    }
}

/// Whether `path` ends in a ransomware-style extension (case-insensitive).
pub fn has_suspicious_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUSPICIOUS_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Decision and audit pipeline for one protected scope.
pub struct EventGate<E: Environment, S: AuditStore> {
    session: SessionHandle<E>,
    store: S,
    config: GateConfig,
    burst: BurstDetector<E::Instant>,
    stats: GateStats,
}

impl<E: Environment, S: AuditStore> EventGate<E, S> {
    /// Create a gate consulting `session` and recording into `store`.
    pub fn new(session: SessionHandle<E>, store: S, config: GateConfig) -> Self {
        let burst = BurstDetector::new(config.burst_window, config.burst_threshold);
        Self { session, store, config, burst, stats: GateStats::default() }
    }

    /// Session this gate consults.
    pub fn session(&self) -> &SessionHandle<E> {
        &self.session
    }

    /// Audit store this gate records into.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Counts so far.
    pub fn stats(&self) -> GateStats {
        self.stats
    }

    /// Process an event, failing closed.
    ///
    /// Any error from [`Self::process_event`] becomes
    /// `Denied(StoreUnavailable)`: a decision that cannot be recorded is never
    /// an allow.
    pub fn decide(&mut self, event: &FsEvent) -> GateOutcome {
        match self.process_event(event) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.failed += 1;
                tracing::error!(event = %event, error = %e, "cannot record decision, denying");
                GateOutcome::denied(DenyReason::StoreUnavailable)
            },
        }
    }

    /// Process an event, surfacing store failures.
    ///
    /// A file that exists but cannot be read is not an error: it is denied
    /// with [`DenyReason::Unreadable`] and recorded.
    ///
    /// # Errors
    ///
    /// `GateError::StoreUnavailable` if the audit store failed. Nothing was
    /// committed for the event in that case.
    pub fn process_event(&mut self, event: &FsEvent) -> Result<GateOutcome, GateError> {
        let env = self.session.env().clone();
        let burst_detected = self.burst.record(env.now());
        let timestamp = env.wall_clock_secs();

        let suspicious_extension = match event {
            FsEvent::Create(path) | FsEvent::Modify(path) => has_suspicious_extension(path),
            FsEvent::Moved { dest, .. } => has_suspicious_extension(dest),
            FsEvent::Delete(_) => false,
        };

        if burst_detected {
            tracing::warn!(event = %event, "burst of file events");
        }
        if suspicious_extension {
            tracing::warn!(event = %event, "suspicious extension");
        }

        let denied = |reason, record| GateOutcome {
            decision: Decision::Denied(reason),
            record: Some(record),
            suspicious_encryption: false,
            suspicious_extension,
            burst_detected,
            truncated_read: false,
        };

        if !self.session.is_valid() {
            let record = self.refused(event, DenyReason::SessionLocked, timestamp)?;
            self.stats.blocked += 1;
            tracing::warn!(path = %record.path, kind = %record.kind, "blocked: session locked");
            return Ok(denied(DenyReason::SessionLocked, record));
        }

        let analysed = match event {
            FsEvent::Delete(_) => Ok(None),
            FsEvent::Create(path) | FsEvent::Modify(path) => self.analyse(path),
            FsEvent::Moved { dest, .. } => self.analyse(dest),
        };

        let fingerprint = match analysed {
            Ok(fp) => fp,
            Err(GateError::Io { path, reason }) => {
                let record = self.refused(event, DenyReason::Unreadable, timestamp)?;
                self.stats.unreadable += 1;
                tracing::warn!(path = %path, reason = %reason, "denied: file unreadable");
                return Ok(denied(DenyReason::Unreadable, record));
            },
            Err(e) => return Err(e),
        };

        let record = match (event, &fingerprint) {
            (FsEvent::Create(path) | FsEvent::Modify(path), Some(fp)) => {
                self.changed(path, event.kind(), fp, timestamp)?
            },
            (FsEvent::Moved { src, dest }, Some(fp)) => self.moved(src, dest, fp, timestamp)?,
            (FsEvent::Moved { src, .. }, None) => self.deleted(src, timestamp)?,
            (other, _) => self.deleted(other.path(), timestamp)?,
        };

        let entropy = fingerprint.map(|fp| fp.entropy);
        let truncated_read = fingerprint.is_some_and(|fp| fp.truncated);
        let suspicious_encryption = entropy.is_some_and(|e| e > self.config.encryption_threshold);

        self.stats.allowed += 1;
        if suspicious_encryption {
            self.stats.suspicious += 1;
            tracing::warn!(
                path = %record.path,
                entropy = entropy.unwrap_or_default(),
                "high entropy content, possible encryption"
            );
        }
        if truncated_read {
            tracing::warn!(
                path = %record.path,
                cap = self.config.max_read_bytes,
                "file exceeds read cap, digested by prefix and length"
            );
        }
        tracing::info!(path = %record.path, kind = %record.kind, "allowed");

        Ok(GateOutcome {
            decision: Decision::Allowed,
            record: Some(record),
            suspicious_encryption,
            suspicious_extension,
            burst_detected,
            truncated_read,
        })
    }

    /// Fingerprint `path`. `None` if it vanished before it could be read.
    fn analyse(&self, path: &str) -> Result<Option<Fingerprint>, GateError> {
        match fingerprint_file(Path::new(path), self.config.read_limits()) {
            Ok(fp) => Ok(Some(fp)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path, "file vanished, treating as delete");
                Ok(None)
            },
            Err(e) => Err(GateError::Io { path: path.to_string(), reason: e.to_string() }),
        }
    }

    /// Record a denial as `BLOCKED_*`. File states are never touched.
    fn refused(
        &self,
        event: &FsEvent,
        reason: DenyReason,
        timestamp: u64,
    ) -> Result<EventRecord, GateError> {
        let kind = event.kind().blocked();
        let record = match event {
            FsEvent::Moved { src, dest } => {
                EventRecord::new(dest, kind, timestamp).with_previous_path(src)
            },
            other => EventRecord::new(other.path(), kind, timestamp),
        }
        .with_deny_reason(reason);

        self.store.commit_event(&record, StateChange::Unchanged)?;
        Ok(record)
    }

    fn deleted(&self, path: &str, timestamp: u64) -> Result<EventRecord, GateError> {
        let prior = self.store.get_file_state(path)?;
        let record = EventRecord::new(path, EventKind::Delete, timestamp).with_before(prior.as_ref());

        self.store.commit_event(&record, StateChange::Remove(path))?;
        Ok(record)
    }

    fn changed(
        &self,
        path: &str,
        kind: EventKind,
        fp: &Fingerprint,
        timestamp: u64,
    ) -> Result<EventRecord, GateError> {
        let prior = self.store.get_file_state(path)?;
        let record =
            EventRecord::new(path, kind, timestamp).with_before(prior.as_ref()).with_after(fp);
        let state = FileState::observed(path, fp, timestamp, prior.as_ref());

        self.store.commit_event(&record, StateChange::Upsert(&state))?;
        Ok(record)
    }

    fn moved(
        &self,
        src: &str,
        dest: &str,
        fp: &Fingerprint,
        timestamp: u64,
    ) -> Result<EventRecord, GateError> {
        let prior = self.store.get_file_state(src)?;
        let record = EventRecord::new(dest, EventKind::Move, timestamp)
            .with_previous_path(src)
            .with_before(prior.as_ref())
            .with_after(fp);
        let state = FileState::observed(dest, fp, timestamp, prior.as_ref());

        self.store.commit_event(&record, StateChange::Rename { from: src, to: &state })?;
        Ok(record)
    }
}
