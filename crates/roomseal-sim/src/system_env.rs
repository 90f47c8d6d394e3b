//! Production Environment implementation using the OS random source.
//!
//! `SystemEnv` draws every private scalar, nonce and padding byte from
//! getrandom. Output is not reproducible; use `roomseal_core::testing` for
//! seeded runs.

use roomseal_core::Environment;

/// Production environment using OS cryptographic randomness.
///
/// # Security
///
/// getrandom reads from the OS CSPRNG (e.g., `getrandom(2)` on Linux,
/// `BCryptGenRandom` on Windows), which is suitable for identity keys and
/// counter-mode nonces.
///
/// # Panics
///
/// Panics if the OS RNG fails. A participant without working randomness
/// would emit predictable keys and nonces, so there is no safe way to
/// continue.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - keys and nonces would be predictable");
    }
}
