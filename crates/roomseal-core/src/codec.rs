//! Message sealing and opening.
//!
//! # Send path
//!
//! ```text
//! plaintext ‖ 64 random bytes                     (padded)
//!   for each recipient, by name:
//!     iv_r         = fresh nonce
//!     ciphertext_r = AES-256-CTR(enc_key_r, iv_r, padded)
//! transcript = ciphertext_1 ‖ iv_1 ‖ … ‖ ciphertext_n ‖ iv_n
//!   hmac_r     = HMAC-SHA512(mac_key_r, transcript)
//! tag = SHA-512⁸(padded ‖ hmac_1 ‖ … ‖ hmac_n)
//! ```
//!
//! # Receive path
//!
//! The receiver rebuilds the transcript from every entry present in the
//! envelope (not from its own roster), checks its own HMAC, records its nonce,
//! decrypts, recomputes the tag, and only then strips the padding. Any failure
//! discards the message; no partial plaintext is ever returned.

use std::collections::{BTreeMap, BTreeSet};

use roomseal_crypto::{
    SharedSecret, Transcript, decrypt, encrypt, message_tag, verify_message_tag,
};

use crate::{
    config::PADDING_LEN,
    env::Environment,
    envelope::{MessageEnvelope, RecipientBlock, RecipientEntry},
    error::{OpenError, SessionError},
    replay::ReplayGuard,
};

/// Encrypt `plaintext` for every peer in `recipients`.
///
/// `recipients` maps peer name to shared secret; its order is the canonical
/// recipient order.
///
/// # Errors
///
/// - `NoRecipients`: `recipients` is empty
/// - `NonceExhausted`: the replay guard could not produce a fresh nonce
pub fn seal<E: Environment>(
    plaintext: &str,
    recipients: &BTreeMap<&str, &SharedSecret>,
    guard: &mut ReplayGuard,
    env: &E,
) -> Result<MessageEnvelope, SessionError> {
    let mut padded = plaintext.as_bytes().to_vec();
    padded.extend_from_slice(&env.random_array::<PADDING_LEN>());

    seal_padded(&padded, recipients, guard, env)
}

fn seal_padded<E: Environment>(
    padded: &[u8],
    recipients: &BTreeMap<&str, &SharedSecret>,
    guard: &mut ReplayGuard,
    env: &E,
) -> Result<MessageEnvelope, SessionError> {
    if recipients.is_empty() {
        return Err(SessionError::NoRecipients);
    }

    let mut sealed = Vec::with_capacity(recipients.len());
    for (&name, secret) in recipients {
        let iv = guard.reserve_nonce(env)?;
        let ciphertext = encrypt(secret.enc_key(), &iv, padded)?;
        sealed.push((name, secret, ciphertext, iv));
    }

    let transcript: Transcript =
        sealed.iter().map(|(_, _, ciphertext, iv)| (ciphertext.as_slice(), iv)).collect();

    let blocks: Vec<(&str, RecipientBlock)> = sealed
        .iter()
        .map(|(name, secret, ciphertext, iv)| {
            let hmac = transcript.authenticate(secret.mac_key()).to_vec();
            (*name, RecipientBlock { ciphertext: ciphertext.clone(), iv: *iv, hmac })
        })
        .collect();

    let tag = message_tag(padded, blocks.iter().map(|(_, block)| block.hmac.as_slice()));

    Ok(MessageEnvelope {
        recipients: blocks
            .into_iter()
            .map(|(name, block)| (name.to_string(), RecipientEntry::Block(block)))
            .collect(),
        tag: Some(tag.to_vec()),
    })
}

/// Verify and decrypt the entry addressed to `local_name`.
///
/// `secret` is the secret shared with the sender. The nonce is recorded in
/// `guard` only after the HMAC verifies, so forged envelopes cannot burn
/// nonces.
///
/// # Errors
///
/// - `MissingEntry`: no entry for `local_name`
/// - `AuthenticationFailure`: any entry is malformed, or the HMAC does not
///   verify
/// - `ReplayDetected`: the nonce was already used in this session
/// - `TagMismatch`: tag absent or does not match
/// - `MalformedPlaintext`: shorter than the padding, or not UTF-8
pub fn open(
    local_name: &str,
    envelope: &MessageEnvelope,
    secret: &SharedSecret,
    guard: &mut ReplayGuard,
) -> Result<String, OpenError> {
    let local = match envelope.recipients.get(local_name) {
        Some(RecipientEntry::Block(block)) => block,
        Some(RecipientEntry::Malformed(_)) => return Err(OpenError::AuthenticationFailure),
        None => return Err(OpenError::MissingEntry { recipient: local_name.to_string() }),
    };

    // Every entry feeds the transcript, so one bad entry breaks it for all
    let Some(blocks) = envelope.blocks() else {
        return Err(OpenError::AuthenticationFailure);
    };

    let transcript: Transcript =
        blocks.iter().map(|block| (block.ciphertext.as_slice(), &block.iv)).collect();
    if !transcript.verify(secret.mac_key(), &local.hmac) {
        return Err(OpenError::AuthenticationFailure);
    }

    if !guard.reject_if_reused(&local.iv) {
        return Err(OpenError::ReplayDetected);
    }

    let mut padded = decrypt(secret.enc_key(), &local.iv, &local.ciphertext)?;

    let computed = message_tag(&padded, blocks.iter().map(|block| block.hmac.as_slice()));
    let tag_matches =
        envelope.tag.as_deref().is_some_and(|received| verify_message_tag(&computed, received));
    if !tag_matches {
        return Err(OpenError::TagMismatch);
    }

    let Some(len) = padded.len().checked_sub(PADDING_LEN) else {
        return Err(OpenError::MalformedPlaintext {
            reason: format!("{} bytes is shorter than the {PADDING_LEN}-byte padding", padded.len()),
        });
    };
    padded.truncate(len);

    String::from_utf8(padded)
        .map_err(|e| OpenError::MalformedPlaintext { reason: e.utf8_error().to_string() })
}

/// Room participants the sender failed to address with a well-formed block.
///
/// The broadcast pseudo-peer, the sender and the local participant are not
/// expected to have entries. Returned names are sorted and unique.
pub fn missing_recipients<I>(
    envelope: &MessageEnvelope,
    roster: I,
    sender: &str,
    local_name: &str,
    broadcast_channel: &str,
) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    roster
        .into_iter()
        .filter(|name| {
            let name = name.as_ref();
            name != broadcast_channel && name != sender && name != local_name
        })
        .filter(|name| envelope.block(name.as_ref()).is_none())
        .map(|name| name.as_ref().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use roomseal_crypto::{IdentityKeyPair, NONCE_LEN, Nonce};
    use serde_json::Value;

    use super::*;
    use crate::config::DEFAULT_MAX_NONCE_ATTEMPTS;

    #[derive(Clone)]
    struct CountingEnv(std::sync::Arc<std::sync::atomic::AtomicU8>);

    impl CountingEnv {
        fn new() -> Self {
            Self(std::sync::Arc::new(std::sync::atomic::AtomicU8::new(1)))
        }
    }

    impl Environment for CountingEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            let next = self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            buffer.fill(next);
        }
    }

    struct Room {
        alice: IdentityKeyPair,
        bob: IdentityKeyPair,
        carol: IdentityKeyPair,
    }

    impl Room {
        fn new() -> Self {
            Self {
                alice: IdentityKeyPair::from_random([1; 32]),
                bob: IdentityKeyPair::from_random([2; 32]),
                carol: IdentityKeyPair::from_random([3; 32]),
            }
        }

        fn alice_with(&self, peer: &IdentityKeyPair) -> SharedSecret {
            SharedSecret::derive(&self.alice, &peer.public_key()).unwrap()
        }

        fn from_alice(&self, peer: &IdentityKeyPair) -> SharedSecret {
            SharedSecret::derive(peer, &self.alice.public_key()).unwrap()
        }
    }

    fn guard() -> ReplayGuard {
        ReplayGuard::new(DEFAULT_MAX_NONCE_ATTEMPTS)
    }

    fn seal_for_bob_and_carol(room: &Room, plaintext: &str) -> MessageEnvelope {
        let with_bob = room.alice_with(&room.bob);
        let with_carol = room.alice_with(&room.carol);
        let recipients = BTreeMap::from([("bob", &with_bob), ("carol", &with_carol)]);

        seal(plaintext, &recipients, &mut guard(), &CountingEnv::new()).unwrap()
    }

    #[test]
    fn every_recipient_opens() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hello room");

        let bob = open("bob", &envelope, &room.from_alice(&room.bob), &mut guard()).unwrap();
        let carol = open("carol", &envelope, &room.from_alice(&room.carol), &mut guard()).unwrap();

        assert_eq!(bob, "hello room");
        assert_eq!(carol, "hello room");
    }

    #[test]
    fn ciphertext_carries_padding() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hi");
        let block = envelope.block("bob").unwrap();
        assert_eq!(block.ciphertext.len(), 2 + PADDING_LEN);
        assert_eq!(block.hmac.len(), 64);
        assert_eq!(envelope.tag.as_ref().map(Vec::len), Some(64));
    }

    #[test]
    fn each_recipient_gets_its_own_nonce() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hi");
        assert_ne!(envelope.block("bob").unwrap().iv, envelope.block("carol").unwrap().iv);
    }

    #[test]
    fn no_recipients_is_an_error() {
        let result = seal("hi", &BTreeMap::new(), &mut guard(), &CountingEnv::new());
        assert_eq!(result, Err(SessionError::NoRecipients));
    }

    #[test]
    fn wrong_secret_fails_authentication() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hello");

        // Carol tries to read Bob's entry with her own secret
        let result = open("bob", &envelope, &room.from_alice(&room.carol), &mut guard());
        assert_eq!(result, Err(OpenError::AuthenticationFailure));
    }

    #[test]
    fn second_open_is_a_replay() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hello");
        let secret = room.from_alice(&room.bob);
        let mut bob_guard = guard();

        assert!(open("bob", &envelope, &secret, &mut bob_guard).is_ok());
        assert_eq!(
            open("bob", &envelope, &secret, &mut bob_guard),
            Err(OpenError::ReplayDetected)
        );
    }

    #[test]
    fn failed_authentication_does_not_record_nonce() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hello");
        let mut bob_guard = guard();

        let _ = open("bob", &envelope, &room.from_alice(&room.carol), &mut bob_guard);
        assert!(bob_guard.is_empty());
    }

    #[test]
    fn tampered_tag_is_a_tag_mismatch() {
        let room = Room::new();
        let mut envelope = seal_for_bob_and_carol(&room, "hello");
        if let Some(tag) = envelope.tag.as_mut() {
            tag[0] ^= 0xFF;
        }

        let result = open("bob", &envelope, &room.from_alice(&room.bob), &mut guard());
        assert_eq!(result, Err(OpenError::TagMismatch));
    }

    #[test]
    fn missing_tag_is_a_tag_mismatch() {
        let room = Room::new();
        let mut envelope = seal_for_bob_and_carol(&room, "hello");
        envelope.tag = None;

        let result = open("bob", &envelope, &room.from_alice(&room.bob), &mut guard());
        assert_eq!(result, Err(OpenError::TagMismatch));
    }

    #[test]
    fn malformed_neighbour_breaks_authentication() {
        let room = Room::new();
        let mut envelope = seal_for_bob_and_carol(&room, "hello");
        envelope.recipients.insert("dave".to_string(), RecipientEntry::Malformed(Value::Null));

        let result = open("bob", &envelope, &room.from_alice(&room.bob), &mut guard());
        assert_eq!(result, Err(OpenError::AuthenticationFailure));
    }

    #[test]
    fn absent_local_entry() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hello");

        let result = open("dave", &envelope, &room.from_alice(&room.bob), &mut guard());
        assert_eq!(result, Err(OpenError::MissingEntry { recipient: "dave".to_string() }));
    }

    #[test]
    fn short_payload_is_malformed() {
        let room = Room::new();
        let with_bob = room.alice_with(&room.bob);
        let recipients = BTreeMap::from([("bob", &with_bob)]);
        let envelope =
            seal_padded(&[0u8; 10], &recipients, &mut guard(), &CountingEnv::new()).unwrap();

        let result = open("bob", &envelope, &room.from_alice(&room.bob), &mut guard());
        assert!(matches!(result, Err(OpenError::MalformedPlaintext { .. })));
    }

    #[test]
    fn non_utf8_payload_is_malformed() {
        let room = Room::new();
        let with_bob = room.alice_with(&room.bob);
        let recipients = BTreeMap::from([("bob", &with_bob)]);

        let mut padded = vec![0xFF, 0xFE];
        padded.extend_from_slice(&[0u8; PADDING_LEN]);
        let envelope =
            seal_padded(&padded, &recipients, &mut guard(), &CountingEnv::new()).unwrap();

        let result = open("bob", &envelope, &room.from_alice(&room.bob), &mut guard());
        assert!(matches!(result, Err(OpenError::MalformedPlaintext { .. })));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "");
        let opened = open("bob", &envelope, &room.from_alice(&room.bob), &mut guard()).unwrap();
        assert_eq!(opened, "");
    }

    #[test]
    fn missing_recipients_ignores_sender_self_and_broadcast() {
        let room = Room::new();
        let mut envelope = seal_for_bob_and_carol(&room, "hello");
        envelope.recipients.insert(
            "erin".to_string(),
            RecipientEntry::Malformed(serde_json::json!({ "message": "AAAA" })),
        );

        let roster = ["main-Conversation", "alice", "bob", "carol", "dave", "erin", "dave"];
        let missing = missing_recipients(&envelope, roster, "alice", "bob", "main-Conversation");

        assert_eq!(missing, vec!["dave".to_string(), "erin".to_string()]);
    }

    #[test]
    fn complete_envelope_has_no_missing_recipients() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hello");
        let roster = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];

        assert!(missing_recipients(&envelope, &roster, "alice", "bob", "main-Conversation").is_empty());
    }

    #[test]
    fn arrival_order_transcript_fails() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "hello");
        let secret = room.from_alice(&room.bob);

        let mut arrival = Transcript::new();
        for name in ["carol", "bob"] {
            let block = envelope.block(name).unwrap();
            arrival.push(&block.ciphertext, &block.iv);
        }

        assert!(!arrival.verify(secret.mac_key(), &envelope.block("bob").unwrap().hmac));
    }

    #[test]
    fn nonce_shape() {
        let room = Room::new();
        let envelope = seal_for_bob_and_carol(&room, "x");
        let iv = envelope.block("bob").unwrap().iv;
        assert_eq!(Nonce::from_slice(iv.as_bytes()), Ok(iv));
        assert_eq!(iv.as_bytes().len(), NONCE_LEN);
    }
}
