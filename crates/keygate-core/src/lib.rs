//! Keygate core protocol logic.
//!
//! Everything here is Sans-IO apart from reading file content for
//! fingerprinting. Time and randomness come in through [`env::Environment`]
//! so the same code runs against the system clock in production and a
//! virtual clock in simulation.
//!
//! # Components
//!
//! - [`protocol`]: token requests, time windows, generation and validation
//! - [`used_tokens`]: at-most-once ledger of consumed tokens
//! - [`session`]: the Locked/Unlocked access session and its shared handle
//! - [`entropy`] and [`fingerprint`]: content analysis for the gate
//! - [`event`] and [`feed`]: file-system events, audit records and the line
//!   feed they arrive on

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod entropy;
pub mod env;
pub mod error;
pub mod event;
pub mod feed;
pub mod fingerprint;
pub mod protocol;
pub mod session;
pub mod used_tokens;

#[cfg(test)]
mod test_support;

pub use entropy::{EntropyClass, shannon_entropy};
pub use env::{Environment, SessionInstant};
pub use error::{CoreError, DenyReason, ParseError};
pub use event::{EventKind, EventRecord, FileState, FsEvent};
pub use feed::{ControlCommand, FeedLine, parse_feed_line};
pub use fingerprint::{Digest, Fingerprint, ReadLimits, fingerprint_bytes, fingerprint_file};
pub use protocol::{
    Granted, Operation, TimeWindow, TokenRequest, TokenValidator, generate_token, validate_token,
};
pub use session::{AccessSession, SessionConfig, SessionHandle, SessionStatus};
pub use used_tokens::{MemoryUsedTokens, UsedTokenSet};
