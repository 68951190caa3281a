//! Audit-trail invariants.

use std::collections::HashMap;

use keygate_core::{Digest, EventKind};

use super::{AuditSnapshot, Invariant, InvariantResult, Violation};

/// Blocked records never carry before or after content.
///
/// A blocked event is refused before its content is recorded, so the record
/// can only name the path.
pub struct BlockedRecordsCarryNoContent;

impl Invariant for BlockedRecordsCarryNoContent {
    fn name(&self) -> &'static str {
        "blocked_records_carry_no_content"
    }

    fn check(&self, snapshot: &AuditSnapshot) -> InvariantResult {
        for (i, record) in snapshot.records.iter().enumerate() {
            if !record.kind.is_blocked() {
                continue;
            }
            let has_content = record.digest_before.is_some()
                || record.digest_after.is_some()
                || record.entropy_before.is_some()
                || record.entropy_after.is_some();
            if has_content {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("record {i} ({} {}) carries content", record.kind, record.path),
                });
            }
        }
        Ok(())
    }
}

/// Blocked records carry a deny reason; allowed records never do.
pub struct DenialsNameAReason;

impl Invariant for DenialsNameAReason {
    fn name(&self) -> &'static str {
        "denials_name_a_reason"
    }

    fn check(&self, snapshot: &AuditSnapshot) -> InvariantResult {
        for (i, record) in snapshot.records.iter().enumerate() {
            if record.kind.is_blocked() != record.deny_reason.is_some() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "record {i} ({} {}) deny_reason {:?}",
                        record.kind, record.path, record.deny_reason
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Each allowed record's `digest_before` is the digest the trail last
/// recorded for that path.
///
/// Replays the allowed records against a path-to-digest map. Holds because a
/// record and its state change are committed together.
pub struct DigestChain;

impl Invariant for DigestChain {
    fn name(&self) -> &'static str {
        "digest_chain"
    }

    fn check(&self, snapshot: &AuditSnapshot) -> InvariantResult {
        let mut known: HashMap<&str, Digest> = HashMap::new();

        for (i, record) in snapshot.records.iter().enumerate() {
            let source = match record.kind {
                EventKind::Move => match record.previous_path.as_deref() {
                    Some(src) => src,
                    None => continue,
                },
                EventKind::Create | EventKind::Modify | EventKind::Delete => record.path.as_str(),
                _ => continue,
            };

            let expected = known.get(source).copied();
            if record.digest_before != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "record {i} ({} {}): digest_before {:?}, trail says {:?}",
                        record.kind, record.path, record.digest_before, expected
                    ),
                });
            }

            known.remove(source);
            if let Some(after) = record.digest_after {
                known.insert(record.path.as_str(), after);
            }
        }
        Ok(())
    }
}

/// Move records, and only move records, name the source path.
pub struct MovePaths;

impl Invariant for MovePaths {
    fn name(&self) -> &'static str {
        "move_paths"
    }

    fn check(&self, snapshot: &AuditSnapshot) -> InvariantResult {
        for (i, record) in snapshot.records.iter().enumerate() {
            let is_move = matches!(record.kind, EventKind::Move | EventKind::BlockedMove);
            if is_move != record.previous_path.is_some() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "record {i} ({} {}) previous_path {:?}",
                        record.kind, record.path, record.previous_path
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Timestamps never decrease in append order.
pub struct TimestampMonotonicity;

impl Invariant for TimestampMonotonicity {
    fn name(&self) -> &'static str {
        "timestamp_monotonicity"
    }

    fn check(&self, snapshot: &AuditSnapshot) -> InvariantResult {
        for (i, pair) in snapshot.records.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "record {} at {} follows record {i} at {}",
                        i + 1,
                        pair[1].timestamp,
                        pair[0].timestamp
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use keygate_core::{DenyReason, EventRecord, fingerprint_bytes};

    use super::*;

    fn created(path: &str, content: &[u8], at: u64) -> EventRecord {
        EventRecord::new(path, EventKind::Create, at).with_after(&fingerprint_bytes(content, 1024))
    }

    #[test]
    fn blocked_record_with_content_is_flagged() {
        let mut record = EventRecord::new("/a", EventKind::BlockedModify, 1);
        assert!(BlockedRecordsCarryNoContent.check(&AuditSnapshot::new(vec![record.clone()])).is_ok());

        record.entropy_after = Some(7.9);
        assert!(BlockedRecordsCarryNoContent.check(&AuditSnapshot::new(vec![record])).is_err());
    }

    #[test]
    fn denials_must_name_a_reason() {
        let bare = EventRecord::new("/a", EventKind::BlockedDelete, 1);
        assert!(DenialsNameAReason.check(&AuditSnapshot::new(vec![bare.clone()])).is_err());

        let named = bare.with_deny_reason(DenyReason::SessionLocked);
        assert!(DenialsNameAReason.check(&AuditSnapshot::new(vec![named])).is_ok());

        let allowed = created("/a", b"x", 2).with_deny_reason(DenyReason::Unreadable);
        assert!(DenialsNameAReason.check(&AuditSnapshot::new(vec![allowed])).is_err());
    }

    #[test]
    fn digest_chain_follows_moves() {
        let first = created("/a", b"one", 1);
        let digest = first.digest_after;
        let mut moved = EventRecord::new("/b", EventKind::Move, 2).with_previous_path("/a");
        moved.digest_before = digest;
        moved.digest_after = digest;
        let mut deleted = EventRecord::new("/b", EventKind::Delete, 3);
        deleted.digest_before = digest;

        let snapshot = AuditSnapshot::new(vec![first, moved, deleted]);
        assert!(DigestChain.check(&snapshot).is_ok());
    }

    #[test]
    fn digest_chain_catches_stale_before() {
        let first = created("/a", b"one", 1);
        let second = created("/a", b"two", 2);

        let violation = DigestChain.check(&AuditSnapshot::new(vec![first, second])).unwrap_err();
        assert_eq!(violation.invariant, "digest_chain");
    }

    #[test]
    fn blocked_move_needs_previous_path() {
        let bare = EventRecord::new("/b", EventKind::BlockedMove, 1);
        assert!(MovePaths.check(&AuditSnapshot::new(vec![bare.clone()])).is_err());

        let named = bare.with_previous_path("/a");
        assert!(MovePaths.check(&AuditSnapshot::new(vec![named])).is_ok());
    }
}
