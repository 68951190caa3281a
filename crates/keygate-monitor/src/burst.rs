//! Burst detection.
//!
//! Mass encryption shows up as many write events in a short span. The
//! detector counts events inside a sliding window and reports when the count
//! exceeds a threshold. It is a signal only; it never changes a decision.

use std::{collections::VecDeque, time::Duration};

use keygate_core::SessionInstant;

/// Sliding-window event counter.
#[derive(Debug, Clone)]
pub struct BurstDetector<I: SessionInstant> {
    window: Duration,
    threshold: usize,
    recent: VecDeque<I>,
}

impl<I: SessionInstant> BurstDetector<I> {
    /// Flag more than `threshold` events within `window`.
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self { window, threshold, recent: VecDeque::with_capacity(threshold + 1) }
    }

    /// Count an event at `now`. Returns `true` while in a burst.
    pub fn record(&mut self, now: I) -> bool {
        while let Some(&oldest) = self.recent.front() {
            if now - oldest >= self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        self.recent.push_back(now);
        self.recent.len() > self.threshold
    }

    /// Events currently inside the window.
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Whether no events are inside the window.
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn flags_only_above_threshold() {
        let t0 = Instant::now();
        let mut detector = BurstDetector::new(Duration::from_secs(1), 5);

        for i in 0..5 {
            assert!(!detector.record(t0 + Duration::from_millis(i * 10)));
        }
        assert!(detector.record(t0 + Duration::from_millis(60)), "sixth event inside 1s");
    }

    #[test]
    fn old_events_fall_out_of_window() {
        let t0 = Instant::now();
        let mut detector = BurstDetector::new(Duration::from_secs(1), 2);

        detector.record(t0);
        detector.record(t0 + Duration::from_millis(100));
        assert!(detector.record(t0 + Duration::from_millis(200)));

        assert!(!detector.record(t0 + Duration::from_millis(1150)));
        assert_eq!(detector.len(), 2, "events at 0ms and 100ms expired");
    }

    #[test]
    fn spaced_events_never_burst() {
        let t0 = Instant::now();
        let mut detector = BurstDetector::new(Duration::from_secs(1), 1);

        for i in 0..20 {
            assert!(!detector.record(t0 + Duration::from_secs(i)));
        }
    }
}
