//! Roomseal Cryptographic Primitives
//!
//! Cryptographic building blocks for the roomseal multi-party protocol. Pure
//! functions with deterministic outputs. Callers provide random bytes (private
//! scalars, nonces, padding) so every operation can be replayed in tests.
//!
//! # Key Lifecycle
//!
//! Every participant holds one static X25519 key pair for the whole session.
//! Each pair of participants agrees on a Diffie-Hellman point once, and that
//! point is split into an encryption key and a MAC key.
//!
//! ```text
//! Private scalar (32 random bytes)
//!        │
//!        ▼
//! X25519 base-point multiplication → Public key → Fingerprint
//!        │
//!        ▼
//! X25519(my private, peer public) → SHA-512 → enc_key ‖ mac_key
//!        │                                      │
//!        ▼                                      ▼
//! AES-256-CTR (nonce ‖ 0⁴)              HMAC-SHA512(transcript)
//! ```
//!
//! # Multi-recipient binding
//!
//! A message is encrypted once per recipient. All `(ciphertext, iv)` pairs are
//! concatenated in lexicographic recipient order into a [`Transcript`], and
//! every recipient receives an HMAC of that same transcript under their own MAC
//! key. The [`message_tag`] then hashes the padded plaintext together with
//! every recipient's HMAC through eight rounds of SHA-512, so a recipient can
//! detect a sender who gave different recipients different views.
//!
//! # Security
//!
//! Confidentiality:
//! - Counter mode with a fresh 96-bit nonce per recipient per message
//! - Counter block is `nonce ‖ 00 00 00 00`, so the first block uses counter 0
//!
//! Integrity:
//! - HMAC verification is constant time
//! - Tag comparison is constant time
//!
//! Key hygiene:
//! - Private scalars and derived keys are zeroized on drop
//! - Low-order peer points are rejected during agreement

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod auth;
pub mod cipher;
mod error;
pub mod fingerprint;
pub mod identity;
pub mod shared_secret;

pub use auth::{HMAC_LEN, TAG_LEN, TAG_ROUNDS, Transcript, message_tag, verify_message_tag};
pub use cipher::{NONCE_LEN, Nonce, apply_keystream, decrypt, encrypt};
pub use error::CryptoError;
pub use fingerprint::{FINGERPRINT_LEN, Fingerprint};
pub use identity::{IdentityKeyPair, PUBLIC_KEY_LEN, PublicKey};
pub use shared_secret::{KEY_LEN, SharedSecret};

/// Standard base64 with padding, as used for every binary field on the wire.
pub(crate) fn decode_base64(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    use base64::{Engine, engine::general_purpose::STANDARD};

    STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::InvalidEncoding { reason: e.to_string() })
}

/// Encode bytes as standard padded base64.
pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    use base64::{Engine, engine::general_purpose::STANDARD};

    STANDARD.encode(bytes)
}
