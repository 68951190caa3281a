//! Monitor configuration.
//!
//! Every tunable is externally supplied; the binary fills these from its
//! command-line arguments and the defaults below.

use std::time::Duration;

use keygate_core::{
    ReadLimits, SessionConfig,
    entropy::DEFAULT_ENCRYPTION_THRESHOLD,
    fingerprint::{DEFAULT_MAX_READ_BYTES, DEFAULT_SAMPLE_BYTES},
};
use keygate_crypto::KdfParams;

use crate::MonitorError;

/// Default burst window (1 second)
pub const DEFAULT_BURST_WINDOW: Duration = Duration::from_secs(1);

/// Default burst threshold (more than 5 events per window)
pub const DEFAULT_BURST_THRESHOLD: usize = 5;

/// Default event channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event gate configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// `suspicious_encryption` iff entropy is strictly above this
    pub encryption_threshold: f64,
    /// Bytes of each file sampled for entropy
    pub sample_bytes: usize,
    /// Most bytes read from one file; longer files are digested by prefix
    pub max_read_bytes: u64,
    /// Sliding window for burst detection
    pub burst_window: Duration,
    /// Events within `burst_window` above which a burst is flagged
    pub burst_threshold: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            encryption_threshold: DEFAULT_ENCRYPTION_THRESHOLD,
            sample_bytes: DEFAULT_SAMPLE_BYTES,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            burst_window: DEFAULT_BURST_WINDOW,
            burst_threshold: DEFAULT_BURST_THRESHOLD,
        }
    }
}

impl GateConfig {
    /// Read budget for fingerprinting one file.
    pub fn read_limits(&self) -> ReadLimits {
        ReadLimits { sample_bytes: self.sample_bytes, max_read_bytes: self.max_read_bytes }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorConfig {
    /// Argon2id costs
    pub kdf: KdfParams,
    /// Session validity, window size and scope
    pub session: SessionConfig,
    /// Gate thresholds
    pub gate: GateConfig,
    /// Bounded event channel size (0 means the default)
    pub channel_capacity: usize,
}

impl MonitorConfig {
    /// Channel capacity with the default applied.
    pub fn effective_channel_capacity(&self) -> usize {
        if self.channel_capacity == 0 { DEFAULT_CHANNEL_CAPACITY } else { self.channel_capacity }
    }

    /// Reject values the monitor cannot run with.
    ///
    /// # Errors
    ///
    /// `MonitorError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.kdf.validate().map_err(|e| MonitorError::Config(e.to_string()))?;

        if self.session.validity.is_zero() {
            return Err(MonitorError::Config("session validity must be positive".to_string()));
        }

        if self.session.window_granularity.as_secs() == 0 {
            return Err(MonitorError::Config(
                "window granularity must be at least one second".to_string(),
            ));
        }

        if self.session.scope.is_empty() {
            return Err(MonitorError::Config("session scope must not be empty".to_string()));
        }

        if !(0.0..=8.0).contains(&self.gate.encryption_threshold) {
            return Err(MonitorError::Config(format!(
                "encryption threshold {} outside 0..=8",
                self.gate.encryption_threshold
            )));
        }

        if self.gate.sample_bytes == 0 {
            return Err(MonitorError::Config("sample size must be positive".to_string()));
        }

        if self.gate.max_read_bytes == 0 {
            return Err(MonitorError::Config("read cap must be positive".to_string()));
        }

        if self.gate.burst_window.is_zero() {
            return Err(MonitorError::Config("burst window must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        config.validate().unwrap();

        assert_eq!(config.kdf.time_cost, 2);
        assert_eq!(config.kdf.memory_cost_kib, 65_536);
        assert_eq!(config.session.validity, Duration::from_secs(600));
        assert_eq!(config.session.window_granularity, Duration::from_secs(300));
        assert_eq!(config.gate.encryption_threshold, 7.5);
        assert_eq!(config.gate.sample_bytes, 1024 * 1024);
        assert_eq!(config.gate.max_read_bytes, 256 * 1024 * 1024);
        assert_eq!(config.effective_channel_capacity(), DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn rejects_zero_time_cost() {
        let mut config = MonitorConfig::default();
        config.kdf.time_cost = 0;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn rejects_zero_granularity_and_validity() {
        let mut config = MonitorConfig::default();
        config.session.window_granularity = Duration::from_millis(500);
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));

        let mut config = MonitorConfig::default();
        config.session.validity = Duration::ZERO;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let mut config = MonitorConfig::default();
        config.gate.encryption_threshold = 8.5;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));

        config.gate.encryption_threshold = -0.1;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn rejects_zero_read_cap() {
        let mut config = MonitorConfig::default();
        config.gate.max_read_bytes = 0;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
    }
}
