//! Human-comparable public key fingerprints

use std::fmt;

use sha2::{Digest, Sha512};

use crate::PublicKey;

/// Number of uppercase hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 40;

/// Short digest of a public key for out-of-band verification.
///
/// The first 40 uppercase hex characters of `SHA-512` over the key's fixed
/// 32-byte big-endian encoding. Any participant computing it for the same key
/// gets the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a public key.
    pub fn of(key: &PublicKey) -> Self {
        let mut hex = hex::encode_upper(Sha512::digest(key.to_be_bytes()));
        hex.truncate(FINGERPRINT_LEN);
        Self(hex)
    }

    /// Fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
