//! Simulated environment.
//!
//! Virtual time that only moves when a test calls [`SimEnv::advance`], and a
//! ChaCha RNG seeded per run. The same seed and the same sequence of calls
//! produce the same nonces, tokens and timestamps on every machine.

use std::{
    ops::{Add, Sub},
    sync::{Arc, Mutex},
    time::Duration,
};

use keygate_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Wall-clock second the simulation starts at (2023-11-14T22:13:20Z).
pub const SIM_EPOCH_SECS: u64 = 1_700_000_000;

/// Point on the virtual monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time elapsed since the simulation started.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

#[derive(Debug)]
struct SimState {
    elapsed: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic [`Environment`].
///
/// Clones share the clock and the RNG, so a session, a gate and the test
/// driving them all see the same time.
#[derive(Debug, Clone)]
pub struct SimEnv {
    seed: u64,
    start_secs: u64,
    state: Arc<Mutex<SimState>>,
}

impl SimEnv {
    /// Environment starting at [`SIM_EPOCH_SECS`] with RNG seeded from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self::starting_at(SIM_EPOCH_SECS, seed)
    }

    /// Environment starting at an explicit wall-clock second.
    pub fn starting_at(start_secs: u64, seed: u64) -> Self {
        let state = SimState { elapsed: Duration::ZERO, rng: ChaCha8Rng::seed_from_u64(seed) };
        Self { seed, start_secs, state: Arc::new(Mutex::new(state)) }
    }

    /// Seed this environment was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Move both clocks forward.
    pub fn advance(&self, by: Duration) {
        self.with(|s| s.elapsed += by);
        tracing::trace!(by_ms = by.as_millis(), "sim clock advanced");
    }

    /// Time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        self.with(|s| s.elapsed)
    }

    #[allow(clippy::expect_used)]
    fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut state = self.state.lock().expect("invariant: sim env mutex poisoned");
        f(&mut state)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.with(|s| s.rng.fill_bytes(buffer));
    }

    fn wall_clock_secs(&self) -> u64 {
        self.start_secs + self.elapsed().as_secs()
    }
}
