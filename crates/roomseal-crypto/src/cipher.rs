//! AES-256 in counter mode with 96-bit nonce expansion
//!
//! The 12-byte nonce becomes the first 12 bytes of the 16-byte counter block
//! and the remaining 4 bytes start at zero. Only those last 4 bytes are
//! incremented (big-endian), so block `i` of a message is encrypted under
//! counter `nonce ‖ i`.
//!
//! No padding is applied: ciphertext length equals plaintext length.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::{CryptoError, KEY_LEN, decode_base64, encode_base64};

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Counter block length in bytes (one AES block).
const COUNTER_BLOCK_LEN: usize = 16;

type Aes256Ctr = ctr::Ctr32BE<Aes256>;

/// Per-recipient, per-message 96-bit nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Wrap raw nonce bytes.
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a nonce from an arbitrary slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; NONCE_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidNonceLength { expected: NONCE_LEN, actual: bytes.len() }
        })?;
        Ok(Self(bytes))
    }

    /// Parse a nonce from its base64 wire form.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        Self::from_slice(&decode_base64(encoded)?)
    }

    /// Base64 wire form.
    pub fn to_base64(&self) -> String {
        encode_base64(&self.0)
    }

    /// Raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    /// Initial counter block: `nonce ‖ 00 00 00 00`.
    fn counter_block(&self) -> [u8; COUNTER_BLOCK_LEN] {
        let mut block = [0u8; COUNTER_BLOCK_LEN];
        block[..NONCE_LEN].copy_from_slice(&self.0);
        block
    }
}

/// XOR the AES-256-CTR keystream for `(key, nonce)` into `buffer` in place.
///
/// Encryption and decryption are the same operation.
///
/// # Errors
///
/// - `KeystreamExhausted`: the buffer needs more than 2³² blocks
pub fn apply_keystream(
    key: &[u8; KEY_LEN],
    nonce: &Nonce,
    buffer: &mut [u8],
) -> Result<(), CryptoError> {
    let Ok(mut cipher) = Aes256Ctr::new_from_slices(key, &nonce.counter_block()) else {
        unreachable!("AES-256-CTR accepts a 32-byte key and a 16-byte counter block");
    };

    cipher
        .try_apply_keystream(buffer)
        .map_err(|_| CryptoError::KeystreamExhausted { len: buffer.len() })
}

/// Encrypt `plaintext` under `(key, nonce)`.
pub fn encrypt(
    key: &[u8; KEY_LEN],
    nonce: &Nonce,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut buffer = plaintext.to_vec();
    apply_keystream(key, nonce, &mut buffer)?;
    Ok(buffer)
}

/// Decrypt `ciphertext` under `(key, nonce)`.
///
/// Counter mode carries no authentication; callers must verify the
/// recipient HMAC before trusting the output.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    nonce: &Nonce,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    encrypt(key, nonce, ciphertext)
}

#[cfg(test)]
mod tests {
    use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};

    use super::*;

    const KEY: [u8; KEY_LEN] = [0x5A; KEY_LEN];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let nonce = Nonce::from_bytes([0x01; NONCE_LEN]);
        let plaintext = b"Hello, room!";

        let ciphertext = encrypt(&KEY, &nonce, plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let decrypted = decrypt(&KEY, &nonce, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn empty_input() {
        let nonce = Nonce::from_bytes([0; NONCE_LEN]);
        assert_eq!(encrypt(&KEY, &nonce, b"").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn counter_starts_at_zero_and_increments_low_word() {
        let nonce = Nonce::from_bytes([0xC3; NONCE_LEN]);

        // Three blocks of zeroes expose the raw keystream
        let keystream = encrypt(&KEY, &nonce, &[0u8; 48]).unwrap();

        let block_cipher = Aes256::new(&KEY.into());
        for counter in 0u32..3 {
            let mut block = [0u8; 16];
            block[..NONCE_LEN].copy_from_slice(nonce.as_bytes());
            block[NONCE_LEN..].copy_from_slice(&counter.to_be_bytes());

            let mut expected = GenericArray::from(block);
            block_cipher.encrypt_block(&mut expected);

            let start = counter as usize * 16;
            assert_eq!(
                &keystream[start..start + 16],
                expected.as_slice(),
                "block {counter} must use counter value {counter}"
            );
        }
    }

    #[test]
    fn different_nonces_give_different_ciphertexts() {
        let plaintext = [0x77u8; 40];
        let a = encrypt(&KEY, &Nonce::from_bytes([1; NONCE_LEN]), &plaintext).unwrap();
        let b = encrypt(&KEY, &Nonce::from_bytes([2; NONCE_LEN]), &plaintext).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let nonce = Nonce::from_bytes([9; NONCE_LEN]);
        let ciphertext = encrypt(&KEY, &nonce, b"secret").unwrap();
        let garbage = decrypt(&[0x11; KEY_LEN], &nonce, &ciphertext).unwrap();
        assert_ne!(garbage, b"secret");
    }

    #[test]
    fn nonce_base64_roundtrip() {
        let nonce = Nonce::from_bytes([0xFE; NONCE_LEN]);
        let encoded = nonce.to_base64();

        // 12 bytes encode to exactly 16 characters with no padding
        assert_eq!(encoded.len(), 16);
        assert!(!encoded.ends_with('='));
        assert_eq!(Nonce::from_base64(&encoded), Ok(nonce));
    }

    #[test]
    fn nonce_rejects_wrong_length() {
        assert_eq!(
            Nonce::from_slice(&[0; 16]),
            Err(CryptoError::InvalidNonceLength { expected: 12, actual: 16 })
        );
    }
}
