//! Monitor runtime.
//!
//! Events and control commands arrive on one bounded channel and are handled
//! strictly in arrival order, so file-state transitions for a path are
//! linearly ordered. Each event is processed to completion (read, hash,
//! classify, record) before the next is taken off the channel.
//!
//! Shutdown stops taking new input; the event being processed finishes
//! first. Dropping every [`MonitorHandle`] drains what is queued and then
//! stops.

use std::{fmt, sync::Arc};

use keygate_core::{ControlCommand, Environment, FeedLine, FsEvent, SessionStatus};
use keygate_crypto::MasterKey;
use tokio::sync::{mpsc, watch};

use crate::{AuditStore, Decision, EventGate, GateOutcome, GateStats, MonitorError};

/// Input accepted by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorInput {
    /// File-system event for the gate
    Event(FsEvent),
    /// Session or reporting command
    Control(ControlCommand),
}

impl From<FeedLine> for MonitorInput {
    fn from(line: FeedLine) -> Self {
        match line {
            FeedLine::Event(event) => Self::Event(event),
            FeedLine::Control(command) => Self::Control(command),
        }
    }
}

/// What the monitor reports back for each input.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorReport {
    /// Gate outcome for an event
    Outcome {
        /// The event
        event: FsEvent,
        /// Gate result
        outcome: GateOutcome,
    },
    /// Session opened; carries the token's log prefix
    Unlocked {
        /// First 8 hex characters of the session token
        token_prefix: String,
    },
    /// Result of a renew request
    Renewed(bool),
    /// Session closed
    Locked,
    /// Session status
    Status(SessionStatus),
    /// Gate counters
    Stats(GateStats),
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outcome { event, outcome } => {
                match outcome.decision {
                    Decision::Allowed => write!(f, "ALLOWED {event}")?,
                    Decision::Denied(reason) => write!(f, "DENIED {} {event}", reason.as_str())?,
                }
                if let Some(entropy) = outcome.record.as_ref().and_then(|r| r.entropy_after) {
                    write!(f, " entropy={entropy:.2}")?;
                }
                if outcome.suspicious_encryption {
                    f.write_str(" SUSPICIOUS_ENCRYPTION")?;
                }
                if outcome.suspicious_extension {
                    f.write_str(" SUSPICIOUS_EXTENSION")?;
                }
                if outcome.burst_detected {
                    f.write_str(" BURST")?;
                }
                if outcome.truncated_read {
                    f.write_str(" TRUNCATED")?;
                }
                Ok(())
            },
            Self::Unlocked { token_prefix } => write!(f, "UNLOCKED token={token_prefix}.."),
            Self::Renewed(true) => f.write_str("RENEWED"),
            Self::Renewed(false) => f.write_str("RENEW REFUSED (LOCKED)"),
            Self::Locked => f.write_str("LOCKED"),
            Self::Status(status) => write!(f, "{status}"),
            Self::Stats(stats) => write!(f, "{stats}"),
        }
    }
}

/// Cloneable sender side of a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    input: mpsc::Sender<MonitorInput>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl MonitorHandle {
    /// Queue an input, waiting if the channel is full.
    ///
    /// # Errors
    ///
    /// `MonitorError::Stopped` if the monitor has shut down.
    pub async fn submit(&self, input: MonitorInput) -> Result<(), MonitorError> {
        self.input.send(input).await.map_err(|_| MonitorError::Stopped)
    }

    /// Stop accepting input. The current event finishes first.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Sequential event loop around an [`EventGate`].
pub struct Monitor<E: Environment, S: AuditStore> {
    gate: EventGate<E, S>,
    master: MasterKey,
    input: mpsc::Receiver<MonitorInput>,
    shutdown: watch::Receiver<bool>,
    reports: mpsc::UnboundedSender<MonitorReport>,
}

impl<E: Environment, S: AuditStore> Monitor<E, S> {
    /// Build a monitor, its handle, and the report stream.
    ///
    /// `master` is used only for `unlock` commands.
    pub fn new(
        gate: EventGate<E, S>,
        master: MasterKey,
        capacity: usize,
    ) -> (Self, MonitorHandle, mpsc::UnboundedReceiver<MonitorReport>) {
        let (input_tx, input_rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let monitor =
            Self { gate, master, input: input_rx, shutdown: shutdown_rx, reports: report_tx };
        let handle = MonitorHandle { input: input_tx, shutdown: Arc::new(shutdown_tx) };

        (monitor, handle, report_rx)
    }

    /// Run until shutdown or until every handle is dropped and the queue is
    /// drained. Returns the final counters.
    pub async fn run(mut self) -> GateStats {
        tracing::info!("monitor started");
        let mut shutdown_open = true;

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed(), if shutdown_open => {
                    match changed {
                        Ok(()) if *self.shutdown.borrow() => {
                            tracing::info!("shutdown requested");
                            break;
                        },
                        Ok(()) => {},
                        Err(_) => shutdown_open = false,
                    }
                },

                input = self.input.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },
            }
        }

        let stats = self.gate.stats();
        tracing::info!(
            allowed = stats.allowed,
            blocked = stats.blocked,
            unreadable = stats.unreadable,
            failed = stats.failed,
            "monitor stopped"
        );
        stats
    }

    /// Handle one input synchronously.
    pub fn handle(&mut self, input: MonitorInput) {
        let report = match input {
            MonitorInput::Event(event) => {
                let outcome = self.gate.decide(&event);
                MonitorReport::Outcome { event, outcome }
            },
            MonitorInput::Control(ControlCommand::Unlock) => {
                let token = self.gate.session().unlock(&self.master);
                tracing::info!(token = %token.log_prefix(), "session unlocked");
                MonitorReport::Unlocked { token_prefix: token.log_prefix() }
            },
            MonitorInput::Control(ControlCommand::Renew) => {
                let renewed = self.gate.session().renew();
                if renewed {
                    tracing::info!("session renewed");
                } else {
                    tracing::warn!("renew refused: session locked");
                }
                MonitorReport::Renewed(renewed)
            },
            MonitorInput::Control(ControlCommand::Lock) => {
                self.gate.session().lock();
                tracing::info!("session locked");
                MonitorReport::Locked
            },
            MonitorInput::Control(ControlCommand::Status) => {
                MonitorReport::Status(self.gate.session().status())
            },
            MonitorInput::Control(ControlCommand::Stats) => MonitorReport::Stats(self.gate.stats()),
        };

        // Nobody listening is fine; the audit store has the record.
        let _ = self.reports.send(report);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use keygate_core::{DenyReason, SessionConfig, SessionHandle};
    use keygate_harness::SimEnv;

    use super::*;
    use crate::{GateConfig, MemoryAuditStore};

    fn monitor() -> (
        Monitor<SimEnv, MemoryAuditStore>,
        MonitorHandle,
        mpsc::UnboundedReceiver<MonitorReport>,
        SimEnv,
    ) {
        let env = SimEnv::with_seed(11);
        let session = SessionHandle::new(env.clone(), SessionConfig::default());
        let gate = EventGate::new(session, MemoryAuditStore::new(), GateConfig::default());
        let (monitor, handle, reports) = Monitor::new(gate, MasterKey::from_bytes([3; 32]), 16);
        (monitor, handle, reports, env)
    }

    #[tokio::test]
    async fn processes_inputs_in_order_and_drains_on_drop() {
        let (monitor, handle, mut reports, _env) = monitor();
        let task = tokio::spawn(monitor.run());

        handle.submit(MonitorInput::Event(FsEvent::Delete("/x".to_string()))).await.unwrap();
        handle.submit(MonitorInput::Control(ControlCommand::Unlock)).await.unwrap();
        handle.submit(MonitorInput::Control(ControlCommand::Status)).await.unwrap();
        handle.submit(MonitorInput::Event(FsEvent::Delete("/x".to_string()))).await.unwrap();
        handle.submit(MonitorInput::Control(ControlCommand::Stats)).await.unwrap();
        drop(handle);

        let stats = task.await.unwrap();
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.allowed, 1);

        let mut seen = Vec::new();
        while let Some(report) = reports.recv().await {
            seen.push(report);
        }
        assert_eq!(seen.len(), 5);

        assert!(matches!(
            &seen[0],
            MonitorReport::Outcome { outcome, .. }
                if outcome.decision == Decision::Denied(DenyReason::SessionLocked)
        ));
        assert!(matches!(&seen[1], MonitorReport::Unlocked { token_prefix } if token_prefix.len() == 8));
        assert!(matches!(&seen[2], MonitorReport::Status(SessionStatus::Unlocked { .. })));
        assert!(matches!(
            &seen[3],
            MonitorReport::Outcome { outcome, .. } if outcome.decision == Decision::Allowed
        ));
        assert!(matches!(&seen[4], MonitorReport::Stats(GateStats { allowed: 1, blocked: 1, .. })));
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (monitor, handle, _reports, _env) = monitor();
        let task = tokio::spawn(monitor.run());

        handle.shutdown();
        let stats = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert_eq!(stats.total(), 0);

        // The receiver is gone once the loop exits.
        assert!(matches!(
            handle.submit(MonitorInput::Control(ControlCommand::Stats)).await,
            Err(MonitorError::Stopped)
        ));
    }

    #[test]
    fn renew_and_lock_commands() {
        let (mut monitor, _handle, mut reports, env) = monitor();

        monitor.handle(MonitorInput::Control(ControlCommand::Renew));
        monitor.handle(MonitorInput::Control(ControlCommand::Unlock));
        env.advance(Duration::from_secs(300));
        monitor.handle(MonitorInput::Control(ControlCommand::Renew));
        monitor.handle(MonitorInput::Control(ControlCommand::Lock));
        monitor.handle(MonitorInput::Control(ControlCommand::Status));

        assert_eq!(reports.try_recv().unwrap(), MonitorReport::Renewed(false));
        assert!(matches!(reports.try_recv().unwrap(), MonitorReport::Unlocked { .. }));
        assert_eq!(reports.try_recv().unwrap(), MonitorReport::Renewed(true));
        assert_eq!(reports.try_recv().unwrap(), MonitorReport::Locked);
        assert_eq!(reports.try_recv().unwrap(), MonitorReport::Status(SessionStatus::Locked));
    }

    #[test]
    fn reports_render_as_single_lines() {
        let (mut monitor, _handle, mut reports, _env) = monitor();

        monitor.handle(MonitorInput::Event(FsEvent::Moved {
            src: "/a/x".to_string(),
            dest: "/a/x.enc".to_string(),
        }));
        monitor.handle(MonitorInput::Control(ControlCommand::Stats));

        assert_eq!(
            reports.try_recv().unwrap().to_string(),
            "DENIED SESSION_LOCKED MOVED /a/x -> /a/x.enc SUSPICIOUS_EXTENSION"
        );
        assert_eq!(
            reports.try_recv().unwrap().to_string(),
            "allowed=0 blocked=1 unreadable=0 failed=0 suspicious=0"
        );
        assert_eq!(MonitorReport::Renewed(false).to_string(), "RENEW REFUSED (LOCKED)");
    }
}
