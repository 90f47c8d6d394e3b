//! In-memory room relay.
//!
//! Stands in for the chat-room transport: it knows who is present, routes
//! envelopes between sessions in FIFO order, and records what each session
//! asked its host to show. Routing is by name only; the relay never looks
//! inside an envelope.
//!
//! ```text
//!   send / join
//!        │
//!        ▼
//!   Session::handle ──▶ actions ──▶ queue (from, to, raw JSON)
//!        ▲                                 │
//!        └───────── Session::receive ◀─────┘
//! ```

use std::collections::{BTreeMap, VecDeque};

use roomseal_core::{
    Environment, Fingerprint, Session, SessionAction, SessionConfig, SessionEvent, Warning,
};

use crate::error::SimError;

/// Envelope queued by the relay and not yet delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Participant the relay will name as sender.
    pub from: String,
    /// Participant that will receive it.
    pub to: String,
    /// Serialized envelope.
    pub raw: String,
}

/// Something a participant's host would show to its user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Verified plaintext reached a participant.
    Delivered {
        /// Receiving participant.
        to: String,
        /// Sending participant.
        from: String,
        /// Message text.
        plaintext: String,
    },

    /// A participant pinned a peer's key.
    KeyPinned {
        /// Participant that pinned the key.
        by: String,
        /// Peer whose key was pinned.
        peer: String,
        /// Fingerprint of the pinned key.
        fingerprint: Fingerprint,
    },

    /// A participant's session raised a security warning.
    Warned {
        /// Participant that saw the warning.
        to: String,
        /// The warning.
        warning: Warning,
    },

    /// A participant dropped an envelope it could not use.
    Rejected {
        /// Participant that dropped it.
        to: String,
        /// Claimed sender.
        from: String,
        /// Why it was dropped.
        reason: String,
    },
}

/// A chat room with every participant's session and one delivery queue.
///
/// # Invariants
///
/// - Participant names are unique and never equal the broadcast channel
/// - Envelopes are delivered in the order they were produced
/// - A sender never receives its own broadcast
pub struct Room<E: Environment> {
    env: E,
    config: SessionConfig,
    sessions: BTreeMap<String, Session<E>>,
    queue: VecDeque<InFlight>,
    events: Vec<RoomEvent>,
}

impl<E: Environment> Room<E> {
    /// Empty room whose sessions draw randomness from `env`.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self { env, config, sessions: BTreeMap::new(), queue: VecDeque::new(), events: Vec::new() }
    }

    /// Names the transport reports as present, including the broadcast
    /// pseudo-peer.
    pub fn roster(&self) -> Vec<String> {
        std::iter::once(self.config.broadcast_channel.clone())
            .chain(self.sessions.keys().cloned())
            .collect()
    }

    /// Participant names in lexicographic order.
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// A participant's session.
    pub fn session(&self, name: &str) -> Option<&Session<E>> {
        self.sessions.get(name)
    }

    /// Everything recorded so far.
    pub fn events(&self) -> &[RoomEvent] {
        &self.events
    }

    /// Take the recorded events, leaving the log empty.
    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    /// Envelopes waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Add a participant and ask everyone already present for their keys.
    ///
    /// Key exchange completes on the next [`Room::run`].
    pub fn join(&mut self, name: &str) -> Result<&Fingerprint, SimError> {
        if name == self.config.broadcast_channel {
            return Err(SimError::ReservedName { name: name.to_string() });
        }
        if self.sessions.contains_key(name) {
            return Err(SimError::DuplicateParticipant { name: name.to_string() });
        }

        let existing: Vec<String> = self.sessions.keys().cloned().collect();
        let session = Session::new(self.env.clone(), name, self.config.clone());
        tracing::info!(participant = %name, fingerprint = %session.own_fingerprint(), "joined room");
        self.sessions.insert(name.to_string(), session);

        for member in existing {
            self.dispatch(name, SessionEvent::RequestPublicKey { to: member })?;
        }

        let Some(session) = self.sessions.get(name) else {
            unreachable!("participant was inserted above");
        };
        Ok(session.own_fingerprint())
    }

    /// Have `from` send `plaintext` to everyone it shares a secret with.
    pub fn send(&mut self, from: &str, plaintext: &str) -> Result<(), SimError> {
        self.dispatch(from, SessionEvent::SendMessage { plaintext: plaintext.to_string() })
    }

    /// Reset a participant's nonce history.
    pub fn reset(&mut self, name: &str) -> Result<(), SimError> {
        self.dispatch(name, SessionEvent::Reset)
    }

    /// Queue a raw envelope as if `from` had sent it to `to`.
    pub fn inject(&mut self, from: &str, to: &str, raw: impl Into<String>) {
        self.queue.push_back(InFlight { from: from.to_string(), to: to.to_string(), raw: raw.into() });
    }

    /// Remove everything queued without delivering it.
    ///
    /// Lets a caller act as the relay operator: inspect, drop, rewrite or
    /// duplicate envelopes and put them back with [`Room::inject`].
    pub fn intercept(&mut self) -> Vec<InFlight> {
        self.queue.drain(..).collect()
    }

    /// Deliver queued envelopes until the queue is empty.
    ///
    /// Returns the number of envelopes delivered. Envelopes addressed to
    /// someone who has left are dropped.
    pub fn run(&mut self) -> Result<usize, SimError> {
        let mut delivered = 0;

        while let Some(delivery) = self.queue.pop_front() {
            let roster = self.roster();
            let Some(session) = self.sessions.get_mut(&delivery.to) else {
                tracing::debug!(to = %delivery.to, "dropping envelope for absent participant");
                continue;
            };

            let event = SessionEvent::EnvelopeReceived {
                sender: delivery.from.clone(),
                raw: delivery.raw,
                roster,
            };
            delivered += 1;

            match session.handle(event) {
                Ok(actions) => self.execute(&delivery.to, actions),
                Err(err) if !err.is_fatal() => {
                    tracing::warn!(to = %delivery.to, from = %delivery.from, error = %err, "envelope rejected");
                    self.events.push(RoomEvent::Rejected {
                        to: delivery.to,
                        from: delivery.from,
                        reason: err.to_string(),
                    });
                },
                Err(err) => {
                    return Err(SimError::Session { participant: delivery.to, source: err });
                },
            }
        }

        Ok(delivered)
    }

    fn dispatch(&mut self, name: &str, event: SessionEvent) -> Result<(), SimError> {
        let session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| SimError::UnknownParticipant { name: name.to_string() })?;

        let actions = session
            .handle(event)
            .map_err(|source| SimError::Session { participant: name.to_string(), source })?;

        self.execute(name, actions);
        Ok(())
    }

    fn execute(&mut self, actor: &str, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Broadcast(envelope) => {
                    let raw = envelope.to_json();
                    let others: Vec<String> =
                        self.sessions.keys().filter(|name| *name != actor).cloned().collect();
                    for to in others {
                        self.inject(actor, &to, raw.clone());
                    }
                },
                SessionAction::SendPublicKey { to, envelope } => {
                    self.inject(actor, &to, envelope.to_json());
                },
                SessionAction::Deliver { sender, plaintext } => {
                    tracing::info!(to = %actor, from = %sender, %plaintext, "message delivered");
                    self.events.push(RoomEvent::Delivered {
                        to: actor.to_string(),
                        from: sender,
                        plaintext,
                    });
                },
                SessionAction::PeerKeyPinned { peer, fingerprint } => {
                    tracing::info!(by = %actor, %peer, %fingerprint, "peer key pinned");
                    self.events.push(RoomEvent::KeyPinned {
                        by: actor.to_string(),
                        peer,
                        fingerprint,
                    });
                },
                SessionAction::Warn(warning) => {
                    tracing::warn!(to = %actor, %warning, "security warning");
                    self.events.push(RoomEvent::Warned { to: actor.to_string(), warning });
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use roomseal_core::testing::SeededEnv;

    use super::*;

    fn room() -> Room<SeededEnv> {
        Room::new(SeededEnv::new(7), SessionConfig::default())
    }

    #[test]
    fn roster_includes_broadcast_channel() {
        let mut room = room();
        room.join("bob").unwrap();
        room.join("alice").unwrap();

        assert_eq!(room.roster(), vec!["main-Conversation", "alice", "bob"]);
        assert_eq!(room.participants().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }

    #[test]
    fn join_rejects_duplicates_and_reserved_names() {
        let mut room = room();
        room.join("alice").unwrap();

        assert!(matches!(room.join("alice"), Err(SimError::DuplicateParticipant { .. })));
        assert!(matches!(room.join("main-Conversation"), Err(SimError::ReservedName { .. })));
    }

    #[test]
    fn join_then_run_pins_keys_both_ways() {
        let mut room = room();
        room.join("alice").unwrap();
        room.join("bob").unwrap();
        assert_eq!(room.pending(), 1);

        room.run().unwrap();

        let alice = room.session("alice").unwrap();
        let bob = room.session("bob").unwrap();
        assert_eq!(alice.peer_fingerprint("bob"), Some(bob.own_fingerprint()));
        assert_eq!(bob.peer_fingerprint("alice"), Some(alice.own_fingerprint()));

        let pins = room.events().iter().filter(|e| matches!(e, RoomEvent::KeyPinned { .. })).count();
        assert_eq!(pins, 2);
    }

    #[test]
    fn broadcast_skips_sender() {
        let mut room = room();
        room.join("alice").unwrap();
        room.join("bob").unwrap();
        room.run().unwrap();
        room.drain_events();

        room.send("alice", "hi").unwrap();
        assert_eq!(room.pending(), 1);
        room.run().unwrap();

        assert_eq!(
            room.events(),
            &[RoomEvent::Delivered {
                to: "bob".to_string(),
                from: "alice".to_string(),
                plaintext: "hi".to_string(),
            }]
        );
    }

    #[test]
    fn intercept_empties_the_queue() {
        let mut room = room();
        room.join("alice").unwrap();
        room.join("bob").unwrap();

        let taken = room.intercept();
        assert_eq!(taken.len(), 1);
        assert_eq!((taken[0].from.as_str(), taken[0].to.as_str()), ("bob", "alice"));
        assert_eq!(room.pending(), 0);
        assert_eq!(room.run().unwrap(), 0);
    }

    #[test]
    fn unknown_sender_is_an_error() {
        let mut room = room();
        assert!(matches!(room.send("nobody", "hi"), Err(SimError::UnknownParticipant { .. })));
    }

    #[test]
    fn garbage_is_recorded_as_rejected() {
        let mut room = room();
        room.join("bob").unwrap();
        room.inject("mallory", "bob", "{not json");

        assert_eq!(room.run().unwrap(), 1);
        assert!(matches!(room.events(), [RoomEvent::Rejected { to, .. }] if to == "bob"));
    }

    #[test]
    fn envelopes_for_absent_participants_are_dropped() {
        let mut room = room();
        room.inject("alice", "ghost", "{}");
        assert_eq!(room.run().unwrap(), 0);
        assert!(room.events().is_empty());
    }
}
