//! Deterministic environment for unit tests.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::Environment;

/// Virtual clock plus seeded RNG. Time moves only through `advance`.
#[derive(Clone)]
pub(crate) struct TestEnv {
    base: Instant,
    start_secs: u64,
    offset: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl TestEnv {
    pub(crate) fn new(start_secs: u64, seed: u64) -> Self {
        Self {
            base: Instant::now(),
            start_secs,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Environment for TestEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap().fill_bytes(buffer);
    }

    fn wall_clock_secs(&self) -> u64 {
        self.start_secs + self.offset.lock().unwrap().as_secs()
    }
}
