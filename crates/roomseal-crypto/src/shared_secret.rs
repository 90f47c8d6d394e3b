//! Pairwise shared secrets from static Diffie-Hellman agreement

use std::fmt;

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, IdentityKeyPair, PublicKey};

/// Length of each derived symmetric key in bytes.
pub const KEY_LEN: usize = 32;

/// Encryption and MAC keys shared with exactly one peer.
///
/// Derived as `SHA-512` over the fixed-width 32-byte big-endian encoding of
/// `X25519(my_private, peer_public)`, with the first 32 bytes used for
/// AES-256-CTR and the last 32 bytes for HMAC-SHA512.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    enc_key: [u8; KEY_LEN],
    mac_key: [u8; KEY_LEN],
}

impl SharedSecret {
    /// Derive the keys shared between `identity` and the owner of `peer`.
    ///
    /// Symmetric: both sides obtain bit-identical keys. The raw agreement
    /// value is zeroized before returning.
    ///
    /// # Errors
    ///
    /// - `NonContributory`: `peer` is a low-order point and the agreement is
    ///   all zeroes
    pub fn derive(identity: &IdentityKeyPair, peer: &PublicKey) -> Result<Self, CryptoError> {
        let agreement = identity.agree(peer);
        if !agreement.was_contributory() {
            return Err(CryptoError::NonContributory);
        }

        let mut point = agreement.to_bytes();
        point.reverse();
        let mut digest = Sha512::digest(point);
        point.zeroize();

        let mut enc_key = [0u8; KEY_LEN];
        let mut mac_key = [0u8; KEY_LEN];
        enc_key.copy_from_slice(&digest[..KEY_LEN]);
        mac_key.copy_from_slice(&digest[KEY_LEN..]);
        digest.as_mut_slice().zeroize();

        Ok(Self { enc_key, mac_key })
    }

    #[cfg(test)]
    pub(crate) fn from_keys(enc_key: [u8; KEY_LEN], mac_key: [u8; KEY_LEN]) -> Self {
        Self { enc_key, mac_key }
    }

    /// AES-256-CTR key.
    pub fn enc_key(&self) -> &[u8; KEY_LEN] {
        &self.enc_key
    }

    /// HMAC-SHA512 key.
    pub fn mac_key(&self) -> &[u8; KEY_LEN] {
        &self.mac_key
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        let enc = self.enc_key[..].ct_eq(&other.enc_key[..]);
        let mac = self.mac_key[..].ct_eq(&other.mac_key[..]);
        (enc & mac).into()
    }
}

impl Eq for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}
