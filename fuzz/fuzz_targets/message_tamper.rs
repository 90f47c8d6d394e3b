//! Fuzz target for tampering with genuine message envelopes
//!
//! Seals a real message from alice to bob and carol, applies arbitrary edits
//! to the parsed envelope, and hands the result to bob.
//!
//! # Strategy
//!
//! - Bit flips in any recipient's ciphertext, nonce or HMAC
//! - Truncated or extended ciphertexts
//! - Dropped recipients and a dropped or altered tag
//!
//! # Invariants
//!
//! - Any edit that touches bytes bob authenticates is never delivered
//! - An unedited envelope always delivers the original plaintext

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomseal_core::{
    testing::SeededEnv, Envelope, MessageEnvelope, Nonce, RecipientBlock, RecipientEntry, Session,
    SessionAction, SessionConfig,
};

const NAMES: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Arbitrary)]
struct Input {
    plaintext: String,
    edits: Vec<Edit>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Target {
    Bob,
    Carol,
}

impl Target {
    fn name(self) -> &'static str {
        match self {
            Target::Bob => "bob",
            Target::Carol => "carol",
        }
    }
}

#[derive(Debug, Arbitrary)]
enum Edit {
    FlipCiphertext { target: Target, index: usize, mask: u8 },
    FlipIv { target: Target, index: usize, mask: u8 },
    FlipHmac { target: Target, index: usize, mask: u8 },
    Truncate { target: Target, keep: usize },
    Extend { target: Target, extra: Vec<u8> },
    Remove { target: Target },
    DropTag,
}

fn outgoing(actions: Vec<SessionAction>) -> Vec<String> {
    actions
        .into_iter()
        .filter_map(|action| match action {
            SessionAction::Broadcast(envelope) | SessionAction::SendPublicKey { envelope, .. } => {
                Some(envelope.to_json())
            },
            _ => None,
        })
        .collect()
}

fn block(message: &mut MessageEnvelope, target: Target) -> Option<&mut RecipientBlock> {
    match message.recipients.get_mut(target.name()) {
        Some(RecipientEntry::Block(block)) => Some(block),
        _ => None,
    }
}

fn room() -> Vec<Session<SeededEnv>> {
    let mut sessions: Vec<_> = NAMES
        .iter()
        .zip(1u64..)
        .map(|(name, seed)| Session::new(SeededEnv::new(seed), *name, SessionConfig::default()))
        .collect();

    for peer in 1..NAMES.len() {
        let (left, right) = sessions.split_at_mut(peer);
        let (alice, other) = (&mut left[0], &mut right[0]);
        for raw in outgoing(alice.announce_public_key(other.name())) {
            for reply in outgoing(other.receive("alice", &raw, NAMES).unwrap()) {
                alice.receive(other.name(), &reply, NAMES).unwrap();
            }
        }
    }
    sessions
}

fuzz_target!(|input: Input| {
    let mut sessions = room();
    let sent = outgoing(sessions[0].send_message(&input.plaintext).unwrap());
    let Envelope::Message(original) = Envelope::parse(&sent[0]).unwrap() else {
        panic!("expected message envelope");
    };

    let mut message = original.clone();
    for edit in &input.edits {
        match edit {
            Edit::FlipCiphertext { target, index, mask } => {
                if let Some(block) = block(&mut message, *target) {
                    if !block.ciphertext.is_empty() {
                        let i = index % block.ciphertext.len();
                        block.ciphertext[i] ^= mask;
                    }
                }
            },
            Edit::FlipIv { target, index, mask } => {
                if let Some(block) = block(&mut message, *target) {
                    let mut iv = *block.iv.as_bytes();
                    iv[index % iv.len()] ^= mask;
                    block.iv = Nonce::from_bytes(iv);
                }
            },
            Edit::FlipHmac { target, index, mask } => {
                if let Some(block) = block(&mut message, *target) {
                    if !block.hmac.is_empty() {
                        let i = index % block.hmac.len();
                        block.hmac[i] ^= mask;
                    }
                }
            },
            Edit::Truncate { target, keep } => {
                if let Some(block) = block(&mut message, *target) {
                    block.ciphertext.truncate(*keep);
                }
            },
            Edit::Extend { target, extra } => {
                if let Some(block) = block(&mut message, *target) {
                    block.ciphertext.extend_from_slice(extra);
                }
            },
            Edit::Remove { target } => {
                message.recipients.remove(target.name());
            },
            Edit::DropTag => message.tag = None,
        }
    }

    let raw = Envelope::Message(message.clone()).to_json();
    let actions = sessions[1].receive("alice", &raw, NAMES).unwrap();
    let delivered: Vec<&str> = actions
        .iter()
        .filter_map(|action| match action {
            SessionAction::Deliver { plaintext, .. } => Some(plaintext.as_str()),
            _ => None,
        })
        .collect();

    if message == original {
        assert_eq!(delivered, vec![input.plaintext.as_str()]);
    } else {
        assert!(delivered.is_empty(), "tampered envelope was delivered");
    }
});
