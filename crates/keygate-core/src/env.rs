//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). The
//! monitor runs against the system clock and OS RNG; the simulation harness
//! runs against a virtual clock and a seeded RNG.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

/// Monotonic instant usable for session expiry arithmetic.
///
/// Blanket-implemented for every type with the right operators, so
/// `std::time::Instant` qualifies without further code.
pub trait SessionInstant:
    Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = Self>
{
}

impl<T> SessionInstant for T where
    T: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = T>
{
}

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `wall_clock_secs()` advances together with `now()`
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type. Production uses `std::time::Instant`.
    type Instant: SessionInstant;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch. Token windows are quantized from this.
    fn wall_clock_secs(&self) -> u64;

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random 16-byte array, the size of every nonce.
    fn random_16(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        bytes
    }
}
