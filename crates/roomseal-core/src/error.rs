//! Error types for the protocol engine

use roomseal_crypto::CryptoError;
use thiserror::Error;

/// Envelope could not be decoded at the transport boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Input is not JSON or lacks the envelope structure
    #[error("invalid envelope: {reason}")]
    InvalidJson {
        /// Decoder error message
        reason: String,
    },
}

/// Reasons an addressed message is discarded without releasing plaintext.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// Envelope has no entry for the local participant
    #[error("no recipient entry for {recipient}")]
    MissingEntry {
        /// Local participant name
        recipient: String,
    },

    /// Recipient HMAC does not verify, or the transcript cannot be rebuilt
    #[error("message authentication failed")]
    AuthenticationFailure,

    /// Nonce was already used in this session
    #[error("nonce reuse detected")]
    ReplayDetected,

    /// Global tag does not bind the plaintext to every recipient HMAC
    #[error("message tag mismatch")]
    TagMismatch,

    /// Decrypted payload is too short or not text
    #[error("malformed plaintext: {reason}")]
    MalformedPlaintext {
        /// What was wrong with the payload
        reason: String,
    },

    /// Symmetric primitive rejected its input
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Errors surfaced to the host driving a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Incoming envelope could not be parsed
    #[error(transparent)]
    Parse(#[from] EnvelopeError),

    /// No peer has an established shared secret yet
    #[error("no recipients with an established shared secret")]
    NoRecipients,

    /// Peer announced a key that cannot be used for agreement
    #[error("invalid public key from {peer}: {reason}")]
    InvalidPublicKey {
        /// Peer that sent the key
        peer: String,
        /// Why the key was rejected
        reason: String,
    },

    /// Random source kept producing nonces that were already used
    #[error("no fresh nonce after {attempts} attempts")]
    NonceExhausted {
        /// Number of draws made
        attempts: u32,
    },

    /// Local cryptographic operation failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl SessionError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors mean the local session can no longer operate safely.
    /// Malformed peer input and missing state are recoverable: the offending
    /// envelope is dropped and the session continues.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Broken local state - fatal
            Self::NonceExhausted { .. } => true,
            Self::Crypto(_) => true,

            // Bad peer input or nothing to do yet - recoverable
            Self::Parse(_) => false,
            Self::NoRecipients => false,
            Self::InvalidPublicKey { .. } => false,
        }
    }
}
