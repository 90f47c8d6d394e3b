//! Fuzz target for Session::receive
//!
//! Drives a session that already shares a key with "alice" using arbitrary
//! raw envelopes, claimed senders and rosters.
//!
//! # Strategy
//!
//! - Arbitrary JSON text, including envelopes of every known type
//! - Senders the session knows, does not know, or that match its own name
//! - Rosters with duplicates and the broadcast pseudo-peer
//!
//! # Invariants
//!
//! - receive never panics
//! - Nothing is delivered unless the claimed sender has a pinned key
//! - An already pinned key never changes

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomseal_core::{testing::SeededEnv, Session, SessionAction, SessionConfig};

#[derive(Debug, Arbitrary)]
struct Input {
    sender: Sender,
    raw: String,
    roster: Vec<String>,
}

#[derive(Debug, Arbitrary)]
enum Sender {
    Alice,
    Bob,
    Other(String),
}

impl Sender {
    fn name(&self) -> &str {
        match self {
            Sender::Alice => "alice",
            Sender::Bob => "bob",
            Sender::Other(name) => name,
        }
    }
}

fn linked_pair() -> (Session<SeededEnv>, Session<SeededEnv>) {
    let mut alice = Session::new(SeededEnv::new(1), "alice", SessionConfig::default());
    let mut bob = Session::new(SeededEnv::new(2), "bob", SessionConfig::default());

    let to_json = |actions: Vec<SessionAction>| -> Vec<String> {
        actions
            .into_iter()
            .filter_map(|action| match action {
                SessionAction::SendPublicKey { envelope, .. } => Some(envelope.to_json()),
                _ => None,
            })
            .collect()
    };

    for raw in to_json(alice.announce_public_key("bob")) {
        for reply in to_json(bob.receive("alice", &raw, ["alice"]).unwrap()) {
            alice.receive("bob", &reply, ["bob"]).unwrap();
        }
    }
    (alice, bob)
}

fuzz_target!(|input: Input| {
    let (_alice, mut bob) = linked_pair();
    let pinned = bob.peer_fingerprint("alice").cloned();
    let sender = input.sender.name();
    let could_deliver = bob.has_shared_secret(sender);

    if let Ok(actions) = bob.receive(sender, &input.raw, &input.roster) {
        for action in actions {
            if let SessionAction::Deliver { sender: from, .. } = action {
                assert!(could_deliver, "delivered from {from} without a pinned key");
            }
        }
    }

    assert_eq!(bob.peer_fingerprint("alice").cloned(), pinned, "pinned key changed");
});
