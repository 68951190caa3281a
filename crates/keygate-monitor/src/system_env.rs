//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` uses the monotonic clock for session expiry, the wall clock for
//! token windows and audit timestamps, and the OS RNG for nonces and salts.
//! Nothing here is reproducible; simulation uses the harness environment.

use keygate_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without working randomness every nonce and
/// salt would be predictable, so there is nothing safe to continue with.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_differ_between_calls() {
        let env = SystemEnv::new();
        assert_ne!(env.random_16(), env.random_16());
    }

    #[test]
    fn clocks_do_not_go_backwards() {
        let env = SystemEnv::new();
        let (t1, s1) = (env.now(), env.wall_clock_secs());
        let (t2, s2) = (env.now(), env.wall_clock_secs());
        assert!(t2 >= t1);
        assert!(s2 >= s1);
        assert!(s1 > 1_600_000_000, "wall clock is epoch seconds");
    }
}
