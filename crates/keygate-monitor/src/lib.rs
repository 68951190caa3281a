//! Keygate monitor.
//!
//! Production glue around [`keygate_core`]: the event gate that decides and
//! records every file-system event, the audit stores it records into, and the
//! tokio runtime that feeds it.
//!
//! # Architecture
//!
//! ```text
//! feed (stdin) ─> parse_feed_line ─> MonitorHandle ─> Monitor ─> EventGate ─> AuditStore
//!                                                        │            │
//!                                                        │            └─> SessionHandle
//!                                                        └─> MonitorReport stream
//! ```
//!
//! # Components
//!
//! - [`EventGate`]: session check, fingerprinting, fail-closed recording
//! - [`Monitor`]: sequential runtime that owns the gate
//! - [`AuditStore`]: file states and event history ([`MemoryAuditStore`],
//!   [`RedbAuditStore`], [`ChaoticAuditStore`])
//! - [`SystemEnv`]: production environment (real time, OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod burst;
mod config;
mod error;
mod gate;
mod monitor;
pub mod storage;
mod system_env;

pub use burst::BurstDetector;
pub use config::{
    DEFAULT_BURST_THRESHOLD, DEFAULT_BURST_WINDOW, DEFAULT_CHANNEL_CAPACITY, GateConfig,
    MonitorConfig,
};
pub use error::{GateError, MonitorError};
pub use gate::{Decision, EventGate, GateOutcome, GateStats, has_suspicious_extension};
pub use monitor::{Monitor, MonitorHandle, MonitorInput, MonitorReport};
pub use storage::{
    AuditStore, ChaoticAuditStore, MemoryAuditStore, RedbAuditStore, StateChange, StorageError,
};
pub use system_env::SystemEnv;
