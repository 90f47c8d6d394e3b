//! Session configuration and protocol constants.

/// Random bytes appended to every plaintext before encryption.
///
/// Receivers reject any decrypted payload shorter than this.
pub const PADDING_LEN: usize = 64;

/// Name of the room-wide pseudo-peer used by the chat transport.
pub const DEFAULT_BROADCAST_CHANNEL: &str = "main-Conversation";

/// Default bound on nonce generation retries.
pub const DEFAULT_MAX_NONCE_ATTEMPTS: u32 = 64;

/// Per-session tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pseudo-peer excluded from the recipient completeness check.
    pub broadcast_channel: String,

    /// Random draws `ReplayGuard::reserve_nonce` makes before giving up.
    ///
    /// With 96-bit nonces a single collision is already astronomically
    /// unlikely; running out of attempts means the random source is broken.
    pub max_nonce_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            broadcast_channel: DEFAULT_BROADCAST_CHANNEL.to_string(),
            max_nonce_attempts: DEFAULT_MAX_NONCE_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    /// Override the broadcast pseudo-peer name.
    #[must_use]
    pub fn with_broadcast_channel(mut self, name: impl Into<String>) -> Self {
        self.broadcast_channel = name.into();
        self
    }

    /// Override the nonce retry bound.
    #[must_use]
    pub fn with_max_nonce_attempts(mut self, attempts: u32) -> Self {
        self.max_nonce_attempts = attempts;
        self
    }
}
