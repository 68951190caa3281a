//! Fuzz target for the event-feed line parser
//!
//! Feeds arbitrary text to `parse_feed_line`.
//!
//! # Invariants
//!
//! - The parser NEVER panics; malformed lines return `ParseError`
//! - Parsed paths are non-empty and carry no surrounding whitespace
//! - A parsed single-path event re-parses to itself from `KIND path`

#![no_main]

use keygate_core::{FeedLine, FsEvent, parse_feed_line};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(FeedLine::Event(event)) = parse_feed_line(line) else {
        return;
    };

    match &event {
        FsEvent::Moved { src, dest } => {
            assert!(!src.is_empty() && !dest.is_empty());
            assert!(!src.contains(char::is_whitespace));
            assert!(!dest.contains(char::is_whitespace));
        },
        single => {
            let path = single.path();
            assert!(!path.is_empty());
            assert_eq!(path, path.trim());

            let again = parse_feed_line(&format!("{} {}", single.kind(), path));
            assert_eq!(again, Ok(FeedLine::Event(event.clone())));
        },
    }
});
