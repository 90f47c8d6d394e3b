//! Error types for cryptographic primitives

use thiserror::Error;

/// Errors from key handling, encoding and symmetric operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Nonce has the wrong length
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected nonce length
        expected: usize,
        /// Actual nonce length
        actual: usize,
    },

    /// Input was not valid base64
    #[error("invalid base64 encoding: {reason}")]
    InvalidEncoding {
        /// Decoder error message
        reason: String,
    },

    /// Peer public key is a low-order point; the agreement carries no secret
    #[error("key agreement is not contributory")]
    NonContributory,

    /// Counter would wrap before the whole buffer is processed
    #[error("keystream exhausted while processing {len} bytes")]
    KeystreamExhausted {
        /// Length of the buffer that could not be processed
        len: usize,
    },
}
