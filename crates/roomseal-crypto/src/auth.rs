//! Recipient authenticators and the multi-recipient message tag
//!
//! # Canonical transcript
//!
//! Every `(ciphertext, iv)` pair of a message is appended to one
//! [`Transcript`] in lexicographic recipient order. Sender and receivers
//! must feed pairs in the same order or every HMAC fails; this type is the
//! only place that concatenation happens.
//!
//! # Message tag
//!
//! `tag = SHA-512⁸(padded_plaintext ‖ hmac₁ ‖ … ‖ hmacₙ)` with the HMACs in the
//! same recipient order as the transcript.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::{KEY_LEN, Nonce};

type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA512 output length in bytes.
pub const HMAC_LEN: usize = 64;

/// Message tag length in bytes (one SHA-512 digest).
pub const TAG_LEN: usize = 64;

/// Number of chained SHA-512 applications in the message tag.
pub const TAG_ROUNDS: usize = 8;

/// Concatenation of every recipient's `(ciphertext, iv)` pair.
///
/// # Invariants
///
/// - Pairs are pushed in ascending recipient-name order
/// - The buffer is identical for every recipient of one message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    buffer: Vec<u8>,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one recipient's ciphertext followed by its nonce.
    pub fn push(&mut self, ciphertext: &[u8], iv: &Nonce) {
        self.buffer.extend_from_slice(ciphertext);
        self.buffer.extend_from_slice(iv.as_bytes());
    }

    /// Raw transcript bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// `HMAC-SHA512(transcript)` under a recipient's MAC key.
    pub fn authenticate(&self, mac_key: &[u8; KEY_LEN]) -> [u8; HMAC_LEN] {
        let mac = self.keyed(mac_key);

        let mut out = [0u8; HMAC_LEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    /// Check a received HMAC in constant time.
    pub fn verify(&self, mac_key: &[u8; KEY_LEN], hmac: &[u8]) -> bool {
        self.keyed(mac_key).verify_slice(hmac).is_ok()
    }

    fn keyed(&self, mac_key: &[u8; KEY_LEN]) -> HmacSha512 {
        let Ok(mut mac) = HmacSha512::new_from_slice(mac_key) else {
            unreachable!("HMAC-SHA512 accepts any key size");
        };
        mac.update(&self.buffer);
        mac
    }
}

impl<'a> FromIterator<(&'a [u8], &'a Nonce)> for Transcript {
    fn from_iter<T: IntoIterator<Item = (&'a [u8], &'a Nonce)>>(iter: T) -> Self {
        let mut transcript = Self::new();
        for (ciphertext, iv) in iter {
            transcript.push(ciphertext, iv);
        }
        transcript
    }
}

/// Compute the message tag binding the plaintext to every recipient HMAC.
///
/// `hmacs` must be in the same recipient order as the transcript.
pub fn message_tag<'a, I>(padded_plaintext: &[u8], hmacs: I) -> [u8; TAG_LEN]
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = Sha512::new();
    hasher.update(padded_plaintext);
    for hmac in hmacs {
        hasher.update(hmac);
    }

    let mut digest = hasher.finalize();
    for _ in 1..TAG_ROUNDS {
        digest = Sha512::digest(digest);
    }

    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&digest);
    tag
}

/// Constant-time comparison of a computed tag against a received one.
pub fn verify_message_tag(computed: &[u8; TAG_LEN], received: &[u8]) -> bool {
    computed[..].ct_eq(received).into()
}
