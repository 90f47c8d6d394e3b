//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from the system random source. Production hosts
//! plug in OS randomness; tests plug in a seeded generator so every key, nonce
//! and padding byte of a session can be replayed.

/// Abstract source of randomness for a session.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible. An environment that cannot produce randomness
///   must abort rather than return predictable bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Fixed-size random array.
    ///
    /// Used for private scalars (32 bytes), nonces (12 bytes) and padding
    /// (64 bytes).
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}
