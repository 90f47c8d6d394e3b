//! Deterministic environment for tests and simulations.

use std::sync::{Arc, Mutex, PoisonError};

use rand_chacha::{
    ChaCha20Rng,
    rand_core::{RngCore, SeedableRng},
};

use crate::env::Environment;

/// ChaCha20 stream seeded from a `u64`.
///
/// Clones share one stream, so a session and the host driving it draw from
/// the same sequence. Two environments built from the same seed produce
/// identical keys, nonces and padding as long as calls happen in the same
/// order.
#[derive(Clone)]
pub struct SeededEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SeededEnv {
    /// Environment drawing from the stream for `seed`.
    pub fn new(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }
}
