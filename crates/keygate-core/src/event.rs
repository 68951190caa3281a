//! File-system events and the audit data model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DenyReason, Digest, Fingerprint};

/// Event from the file-system notification feed.
///
/// Directory events are filtered out upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FsEvent {
    /// File created
    Create(String),
    /// File content changed
    Modify(String),
    /// File removed
    Delete(String),
    /// File renamed or moved
    Moved {
        /// Old path
        src: String,
        /// New path
        dest: String,
    },
}

impl FsEvent {
    /// Audit kind recorded when this event is allowed.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Create(_) => EventKind::Create,
            Self::Modify(_) => EventKind::Modify,
            Self::Delete(_) => EventKind::Delete,
            Self::Moved { .. } => EventKind::Move,
        }
    }

    /// Source path (the only path, except for moves).
    pub fn path(&self) -> &str {
        match self {
            Self::Create(path) | Self::Modify(path) | Self::Delete(path) => path,
            Self::Moved { src, .. } => src,
        }
    }
}

impl fmt::Display for FsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moved { src, dest } => write!(f, "MOVED {src} -> {dest}"),
            other => write!(f, "{} {}", other.kind(), other.path()),
        }
    }
}

/// Kind of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Allowed create
    Create,
    /// Allowed modify
    Modify,
    /// Allowed delete
    Delete,
    /// Allowed move
    Move,
    /// Create while locked
    BlockedCreate,
    /// Modify while locked
    BlockedModify,
    /// Delete while locked
    BlockedDelete,
    /// Move while locked
    BlockedMove,
}

impl EventKind {
    /// Upper-snake name as stored in the audit log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
            Self::Move => "MOVE",
            Self::BlockedCreate => "BLOCKED_CREATE",
            Self::BlockedModify => "BLOCKED_MODIFY",
            Self::BlockedDelete => "BLOCKED_DELETE",
            Self::BlockedMove => "BLOCKED_MOVE",
        }
    }

    /// The `BLOCKED_*` counterpart. Blocked kinds map to themselves.
    pub fn blocked(self) -> Self {
        match self {
            Self::Create | Self::BlockedCreate => Self::BlockedCreate,
            Self::Modify | Self::BlockedModify => Self::BlockedModify,
            Self::Delete | Self::BlockedDelete => Self::BlockedDelete,
            Self::Move | Self::BlockedMove => Self::BlockedMove,
        }
    }

    /// Whether this records a denial.
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            Self::BlockedCreate | Self::BlockedModify | Self::BlockedDelete | Self::BlockedMove
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last observed state of a path. One per known path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileState {
    /// Path (unique key)
    pub path: String,
    /// Content digest
    pub digest: Digest,
    /// Size in bytes
    pub size_bytes: u64,
    /// Entropy of the sampled prefix
    pub entropy: f64,
    /// First observation, epoch seconds
    pub created_at: u64,
    /// Latest observation, epoch seconds
    pub modified_at: u64,
}

impl FileState {
    /// State after observing `fingerprint` at `now`.
    ///
    /// `created_at` carries over from `prior` when the path was already
    /// known.
    pub fn observed(
        path: &str,
        fingerprint: &Fingerprint,
        now: u64,
        prior: Option<&FileState>,
    ) -> Self {
        Self {
            path: path.to_string(),
            digest: fingerprint.digest,
            size_bytes: fingerprint.size_bytes,
            entropy: fingerprint.entropy,
            created_at: prior.map_or(now, |p| p.created_at),
            modified_at: now,
        }
    }
}

/// One audit-trail entry. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Path the event applies to (destination for moves)
    pub path: String,
    /// What happened
    pub kind: EventKind,
    /// Epoch seconds
    pub timestamp: u64,
    /// Source path of a move
    pub previous_path: Option<String>,
    /// Digest before the event
    pub digest_before: Option<Digest>,
    /// Digest after the event
    pub digest_after: Option<Digest>,
    /// Entropy before the event
    pub entropy_before: Option<f64>,
    /// Entropy after the event
    pub entropy_after: Option<f64>,
    /// Why a `BLOCKED_*` record was denied
    #[serde(default)]
    pub deny_reason: Option<DenyReason>,
}

impl EventRecord {
    /// Record with no before/after values.
    pub fn new(path: &str, kind: EventKind, timestamp: u64) -> Self {
        Self {
            path: path.to_string(),
            kind,
            timestamp,
            previous_path: None,
            digest_before: None,
            digest_after: None,
            entropy_before: None,
            entropy_after: None,
            deny_reason: None,
        }
    }

    /// Fill before-values from the prior state, if any.
    #[must_use]
    pub fn with_before(mut self, prior: Option<&FileState>) -> Self {
        if let Some(prior) = prior {
            self.digest_before = Some(prior.digest);
            self.entropy_before = Some(prior.entropy);
        }
        self
    }

    /// Fill after-values from a fresh fingerprint.
    #[must_use]
    pub fn with_after(mut self, fingerprint: &Fingerprint) -> Self {
        self.digest_after = Some(fingerprint.digest);
        self.entropy_after = Some(fingerprint.entropy);
        self
    }

    /// Record why the event was refused.
    #[must_use]
    pub fn with_deny_reason(mut self, reason: DenyReason) -> Self {
        self.deny_reason = Some(reason);
        self
    }

    /// Record the source path of a move.
    #[must_use]
    pub fn with_previous_path(mut self, src: &str) -> Self {
        self.previous_path = Some(src.to_string());
        self
    }
}
