//! Property-based tests for the session message path
//!
//! These tests verify the guarantees a room relies on:
//!
//! 1. **Round-trip**: every addressed recipient recovers the exact plaintext
//! 2. **Tamper detection**: a single flipped byte in a recipient's ciphertext,
//!    nonce or HMAC yields an authentication warning and no plaintext
//! 3. **Replay detection**: a second delivery of the same envelope is refused
//! 4. **Fingerprint symmetry**: every peer sees the fingerprint its owner
//!    reports for itself

use proptest::prelude::*;
use roomseal_core::{
    Envelope, MessageEnvelope, Nonce, RecipientEntry, Session, SessionAction, SessionConfig,
    Warning, testing::SeededEnv,
};
use roomseal_crypto::NONCE_LEN;

const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// Envelopes carried by an action list, serialized.
fn outgoing(actions: &[SessionAction]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|action| match action {
            SessionAction::Broadcast(envelope) | SessionAction::SendPublicKey { envelope, .. } => {
                Some(envelope.to_json())
            },
            _ => None,
        })
        .collect()
}

/// `count` sessions with every pair's keys exchanged.
fn connected_room(count: usize, seed: u64) -> Vec<Session<SeededEnv>> {
    let mut sessions: Vec<Session<SeededEnv>> = NAMES[..count]
        .iter()
        .zip(seed..)
        .map(|(name, seed)| Session::new(SeededEnv::new(seed), *name, SessionConfig::default()))
        .collect();

    for i in 0..count {
        for j in (i + 1)..count {
            let (left, right) = sessions.split_at_mut(j);
            let (a, b) = (&mut left[i], &mut right[0]);

            let announce = outgoing(&a.announce_public_key(b.name()));
            let replies = b.receive(a.name(), &announce[0], NAMES).unwrap();
            for reply in outgoing(&replies) {
                a.receive(b.name(), &reply, NAMES).unwrap();
            }
        }
    }

    sessions
}

fn deliveries(actions: &[SessionAction]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|action| match action {
            SessionAction::Deliver { plaintext, .. } => Some(plaintext.as_str()),
            _ => None,
        })
        .collect()
}

fn message_of(raw: &str) -> MessageEnvelope {
    match Envelope::parse(raw).unwrap() {
        Envelope::Message(message) => message,
        other => panic!("expected message envelope, got {other:?}"),
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Ciphertext,
    Iv,
    Hmac,
}

fn field() -> impl Strategy<Value = Field> {
    prop_oneof![Just(Field::Ciphertext), Just(Field::Iv), Just(Field::Hmac)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_recipient_recovers_plaintext(
        plaintext in any::<String>(),
        count in 2usize..=4,
        seed in any::<u32>(),
    ) {
        let mut room = connected_room(count, u64::from(seed));
        let sent = outgoing(&room[0].send_message(&plaintext).unwrap());
        prop_assert_eq!(sent.len(), 1);

        for recipient in &mut room[1..] {
            let actions = recipient.receive("alice", &sent[0], &NAMES[..count]).unwrap();
            prop_assert_eq!(deliveries(&actions), vec![plaintext.as_str()]);
        }
    }

    #[test]
    fn prop_single_byte_tamper_fails_authentication(
        plaintext in "[a-z ]{0,64}",
        field in field(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
        seed in any::<u32>(),
    ) {
        let mut room = connected_room(3, u64::from(seed));
        let sent = outgoing(&room[0].send_message(&plaintext).unwrap());

        let mut message = message_of(&sent[0]);
        let Some(RecipientEntry::Block(block)) = message.recipients.get_mut("bob") else {
            panic!("bob must have a block");
        };
        let mask = 1u8 << bit;
        match field {
            Field::Ciphertext => {
                let index = position.index(block.ciphertext.len());
                block.ciphertext[index] ^= mask;
            },
            Field::Iv => {
                let mut iv = *block.iv.as_bytes();
                iv[position.index(NONCE_LEN)] ^= mask;
                block.iv = Nonce::from_bytes(iv);
            },
            Field::Hmac => {
                let index = position.index(block.hmac.len());
                block.hmac[index] ^= mask;
            },
        }
        let tampered = Envelope::Message(message).to_json();

        let actions = room[1].receive("alice", &tampered, &NAMES[..3]).unwrap();
        prop_assert!(deliveries(&actions).is_empty());
        prop_assert_eq!(
            actions,
            vec![SessionAction::Warn(Warning::AuthenticationFailed { sender: "alice".to_string() })]
        );
    }

    #[test]
    fn prop_neighbour_ciphertext_tamper_fails_authentication(
        plaintext in "[a-z ]{0,64}",
        position in any::<prop::sample::Index>(),
        seed in any::<u32>(),
    ) {
        let mut room = connected_room(3, u64::from(seed));
        let sent = outgoing(&room[0].send_message(&plaintext).unwrap());

        // Corrupt carol's entry and check bob notices
        let mut message = message_of(&sent[0]);
        let Some(RecipientEntry::Block(block)) = message.recipients.get_mut("carol") else {
            panic!("carol must have a block");
        };
        let index = position.index(block.ciphertext.len());
        block.ciphertext[index] ^= 0x01;
        let tampered = Envelope::Message(message).to_json();

        let actions = room[1].receive("alice", &tampered, &NAMES[..3]).unwrap();
        prop_assert_eq!(
            actions,
            vec![SessionAction::Warn(Warning::AuthenticationFailed { sender: "alice".to_string() })]
        );
    }

    #[test]
    fn prop_replay_is_detected(plaintext in any::<String>(), seed in any::<u32>()) {
        let mut room = connected_room(2, u64::from(seed));
        let sent = outgoing(&room[0].send_message(&plaintext).unwrap());

        let first = room[1].receive("alice", &sent[0], &NAMES[..2]).unwrap();
        prop_assert_eq!(deliveries(&first), vec![plaintext.as_str()]);

        let second = room[1].receive("alice", &sent[0], &NAMES[..2]).unwrap();
        prop_assert_eq!(
            second,
            vec![SessionAction::Warn(Warning::ReplayDetected { sender: "alice".to_string() })]
        );
    }

    #[test]
    fn prop_fingerprints_are_symmetric(count in 2usize..=4, seed in any::<u32>()) {
        let room = connected_room(count, u64::from(seed));

        for owner in &room {
            for observer in room.iter().filter(|s| s.name() != owner.name()) {
                prop_assert_eq!(observer.peer_fingerprint(owner.name()), Some(owner.own_fingerprint()));
            }
        }
    }
}
