//! Static X25519 identity keys
//!
//! One key pair per participant per session. The private scalar never leaves
//! this module except as an input to [`crate::SharedSecret::derive`].

use std::fmt;

use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use crate::{CryptoError, decode_base64, encode_base64};

/// Length of an encoded public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// A participant's public curve point.
///
/// Held in the X25519 little-endian encoding. Everything that leaves the
/// process or gets hashed (wire form, fingerprint) uses the big-endian
/// encoding of the same u-coordinate, see [`PublicKey::to_be_bytes`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Wrap a point in X25519 little-endian encoding.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a little-endian point from an arbitrary slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: PUBLIC_KEY_LEN, actual: bytes.len() }
        })?;
        Ok(Self(bytes))
    }

    /// Parse a point from a fixed-width big-endian slice.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut key = Self::from_slice(bytes)?;
        key.0.reverse();
        Ok(key)
    }

    /// Fixed-width 32-byte big-endian encoding of the u-coordinate.
    pub fn to_be_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Parse a point from its base64 wire form (big-endian).
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        Self::from_be_slice(&decode_base64(encoded)?)
    }

    /// Base64 wire form (big-endian).
    pub fn to_base64(&self) -> String {
        encode_base64(&self.to_be_bytes())
    }

    /// X25519 little-endian encoding.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub(crate) fn to_dalek(self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_base64()).finish()
    }
}

/// A participant's static key pair.
///
/// The private scalar is zeroized when the pair is dropped. Cloning is
/// deliberately not offered: a session owns exactly one identity.
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeyPair {
    /// Build a key pair from 32 bytes drawn from a secure random source.
    ///
    /// The public point is the fixed-base scalar multiplication of the
    /// (clamped) scalar with the Curve25519 base point.
    pub fn from_random(mut random: [u8; 32]) -> Self {
        let secret = StaticSecret::from(random);
        random.zeroize();

        let public = PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    /// Public half of the pair.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Raw Diffie-Hellman agreement with a peer point.
    pub(crate) fn agree(&self, peer: &PublicKey) -> x25519_dalek::SharedSecret {
        self.secret.diffie_hellman(&peer.to_dalek())
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
