//! Line-oriented event feed.
//!
//! One event or control command per line:
//!
//! ```text
//! CREATE <path>
//! MODIFY <path>
//! DELETE <path>
//! MOVED <src> <dest>
//! unlock | renew | lock | status | stats
//! ```
//!
//! Event kinds are case-insensitive. Single-path kinds take the rest of the
//! line as the path, so paths may contain spaces; `MOVED` paths may not.

use crate::{FsEvent, ParseError};

/// Control-path command carried on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Open a session
    Unlock,
    /// Extend the open session
    Renew,
    /// Close the session
    Lock,
    /// Report session status
    Status,
    /// Report allow/block counts
    Stats,
}

/// A parsed feed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLine {
    /// File-system event
    Event(FsEvent),
    /// Control command
    Control(ControlCommand),
}

/// Parse one feed line.
pub fn parse_feed_line(line: &str) -> Result<FeedLine, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let single = |kind: &'static str, make: fn(String) -> FsEvent| {
        if rest.is_empty() {
            Err(ParseError::MissingPath { kind, expected: 1 })
        } else {
            Ok(FeedLine::Event(make(rest.to_string())))
        }
    };

    let control = |command: ControlCommand| {
        if rest.is_empty() {
            Ok(FeedLine::Control(command))
        } else {
            Err(ParseError::UnexpectedArgument(rest.to_string()))
        }
    };

    match word.to_ascii_uppercase().as_str() {
        "CREATE" => single("CREATE", FsEvent::Create),
        "MODIFY" => single("MODIFY", FsEvent::Modify),
        "DELETE" => single("DELETE", FsEvent::Delete),
        "MOVED" => {
            let mut parts = rest.split_whitespace();
            let (Some(src), Some(dest)) = (parts.next(), parts.next()) else {
                return Err(ParseError::MissingPath { kind: "MOVED", expected: 2 });
            };
            if let Some(extra) = parts.next() {
                return Err(ParseError::UnexpectedArgument(extra.to_string()));
            }
            Ok(FeedLine::Event(FsEvent::Moved { src: src.to_string(), dest: dest.to_string() }))
        },
        "UNLOCK" => control(ControlCommand::Unlock),
        "RENEW" => control(ControlCommand::Renew),
        "LOCK" => control(ControlCommand::Lock),
        "STATUS" => control(ControlCommand::Status),
        "STATS" => control(ControlCommand::Stats),
        _ => Err(ParseError::UnknownKind(word.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_single_path_events() {
        assert_eq!(
            parse_feed_line("CREATE /a/f.txt"),
            Ok(FeedLine::Event(FsEvent::Create("/a/f.txt".to_string())))
        );
        assert_eq!(
            parse_feed_line("  modify   /a/f.txt  "),
            Ok(FeedLine::Event(FsEvent::Modify("/a/f.txt".to_string())))
        );
        assert_eq!(
            parse_feed_line("DELETE /a/my report.txt"),
            Ok(FeedLine::Event(FsEvent::Delete("/a/my report.txt".to_string())))
        );
    }

    #[test]
    fn parses_moved() {
        assert_eq!(
            parse_feed_line("MOVED /a/x /a/x.locked"),
            Ok(FeedLine::Event(FsEvent::Moved {
                src: "/a/x".to_string(),
                dest: "/a/x.locked".to_string()
            }))
        );
    }

    #[test]
    fn parses_control_commands() {
        assert_eq!(parse_feed_line("unlock"), Ok(FeedLine::Control(ControlCommand::Unlock)));
        assert_eq!(parse_feed_line("RENEW"), Ok(FeedLine::Control(ControlCommand::Renew)));
        assert_eq!(parse_feed_line("lock"), Ok(FeedLine::Control(ControlCommand::Lock)));
        assert_eq!(parse_feed_line("status"), Ok(FeedLine::Control(ControlCommand::Status)));
        assert_eq!(parse_feed_line("stats"), Ok(FeedLine::Control(ControlCommand::Stats)));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_feed_line("   "), Err(ParseError::Empty));
        assert_eq!(parse_feed_line("CREATE"), Err(ParseError::MissingPath { kind: "CREATE", expected: 1 }));
        assert_eq!(parse_feed_line("MOVED /a"), Err(ParseError::MissingPath { kind: "MOVED", expected: 2 }));
        assert_eq!(
            parse_feed_line("MOVED /a /b /c"),
            Err(ParseError::UnexpectedArgument("/c".to_string()))
        );
        assert_eq!(
            parse_feed_line("lock now"),
            Err(ParseError::UnexpectedArgument("now".to_string()))
        );
        assert_eq!(parse_feed_line("CHMOD /a"), Err(ParseError::UnknownKind("CHMOD".to_string())));
    }

    proptest! {
        #[test]
        fn never_panics(line in ".{0,200}") {
            let _ = parse_feed_line(&line);
        }
    }
}
