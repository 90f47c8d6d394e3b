//! Session state machine.
//!
//! A `Session` is one participant's view of one room. It owns the identity key
//! pair, the peer store and the replay guard, and turns [`SessionEvent`]s into
//! [`SessionAction`]s. It performs no I/O: the host delivers envelopes in and
//! executes the returned actions.
//!
//! # Concurrency
//!
//! Every method takes `&mut self`. A host that shares a session between tasks
//! wraps it in a mutex so nonce reservation and replay checks stay linearized.

use roomseal_crypto::{Fingerprint, IdentityKeyPair, PublicKey};

use crate::{
    codec,
    config::SessionConfig,
    env::Environment,
    envelope::{Envelope, MessageEnvelope},
    error::{OpenError, SessionError},
    event::{SessionAction, SessionEvent, Warning},
    handshake,
    peer::PeerStore,
    replay::ReplayGuard,
};

/// Length of the random private scalar drawn at session start.
const PRIVATE_KEY_LEN: usize = 32;

/// One participant's protocol state for one room.
///
/// # Invariants
///
/// - The identity key pair is fixed for the session's lifetime
/// - A peer's pinned key is never replaced
/// - Plaintext is only delivered after both the HMAC and the tag verify
pub struct Session<E: Environment> {
    env: E,
    name: String,
    config: SessionConfig,
    identity: IdentityKeyPair,
    fingerprint: Fingerprint,
    peers: PeerStore,
    guard: ReplayGuard,
}

impl<E: Environment> Session<E> {
    /// Start a session as `name`, generating a fresh identity key pair.
    pub fn new(env: E, name: impl Into<String>, config: SessionConfig) -> Self {
        let identity = IdentityKeyPair::from_random(env.random_array::<PRIVATE_KEY_LEN>());
        let fingerprint = Fingerprint::of(&identity.public_key());
        let guard = ReplayGuard::new(config.max_nonce_attempts);

        Self {
            env,
            name: name.into(),
            config,
            identity,
            fingerprint,
            peers: PeerStore::new(),
            guard,
        }
    }

    /// Local participant name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Our public key.
    pub fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    /// Fingerprint of our own public key.
    pub fn own_fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Fingerprint of a peer's pinned key.
    pub fn peer_fingerprint(&self, peer: &str) -> Option<&Fingerprint> {
        self.peers.fingerprint(peer)
    }

    /// Whether a shared secret with `peer` exists.
    pub fn has_shared_secret(&self, peer: &str) -> bool {
        self.peers.shared_secret(peer).is_some()
    }

    /// All known peers.
    pub fn peers(&self) -> &PeerStore {
        &self.peers
    }

    /// Nonce history.
    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.guard
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        match event {
            SessionEvent::EnvelopeReceived { sender, raw, roster } => {
                self.receive(&sender, &raw, &roster)
            },
            SessionEvent::SendMessage { plaintext } => self.send_message(&plaintext),
            SessionEvent::RequestPublicKey { to } => Ok(self.request_public_key(&to)),
            SessionEvent::AnnouncePublicKey { to } => Ok(self.announce_public_key(&to)),
            SessionEvent::Reset => {
                self.reset();
                Ok(Vec::new())
            },
        }
    }

    /// Ask `to` for its public key.
    pub fn request_public_key(&self, to: &str) -> Vec<SessionAction> {
        vec![handshake::request(to)]
    }

    /// Send our public key to `to`.
    pub fn announce_public_key(&self, to: &str) -> Vec<SessionAction> {
        vec![handshake::announce(&self.identity, to)]
    }

    /// Encrypt `plaintext` for every peer with a shared secret.
    ///
    /// # Errors
    ///
    /// - `NoRecipients`: no peer key is pinned yet
    /// - `NonceExhausted`: the random source keeps repeating nonces
    pub fn send_message(&mut self, plaintext: &str) -> Result<Vec<SessionAction>, SessionError> {
        let recipients = self.peers.established();
        let envelope = codec::seal(plaintext, &recipients, &mut self.guard, &self.env)?;

        tracing::debug!(from = %self.name, recipients = recipients.len(), "sealed message");
        Ok(vec![SessionAction::Broadcast(Envelope::Message(envelope))])
    }

    /// Process a raw envelope from `sender`.
    ///
    /// `roster` is everyone the transport currently sees in the room and is
    /// only used for the recipient completeness check. Envelopes that are not
    /// addressed to us, or that we cannot act on yet, produce no actions.
    /// Security failures produce [`SessionAction::Warn`] and never a
    /// [`SessionAction::Deliver`].
    ///
    /// # Errors
    ///
    /// - `Parse`: the envelope is not valid JSON of the expected shape
    /// - `InvalidPublicKey`: a first key announcement carried an unusable key
    pub fn receive<I>(
        &mut self,
        sender: &str,
        raw: &str,
        roster: I,
    ) -> Result<Vec<SessionAction>, SessionError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let envelope = Envelope::parse(raw).inspect_err(|e| {
            tracing::debug!(sender = %sender, error = %e, "dropping unparseable envelope");
        })?;

        if !envelope.is_addressed_to(&self.name) {
            tracing::debug!(sender = %sender, kind = envelope.kind(), "envelope not addressed to us");
            return Ok(Vec::new());
        }

        match envelope {
            Envelope::PublicKeyRequest(_) => {
                tracing::debug!(sender = %sender, "public key requested");
                Ok(vec![handshake::announce(&self.identity, sender)])
            },
            Envelope::PublicKey(announcement) => {
                let Some(entry) = announcement.entries.get(&self.name) else {
                    return Ok(Vec::new());
                };
                handshake::accept_public_key(&mut self.peers, &self.identity, sender, entry)
                    .inspect_err(|e| {
                        tracing::warn!(sender = %sender, error = %e, "rejected public key");
                    })
            },
            Envelope::Message(message) => Ok(self.receive_message(sender, &message, roster)),
            Envelope::Unknown(unknown) => {
                tracing::warn!(sender = %sender, kind = %unknown.kind, "unknown envelope type");
                Ok(vec![SessionAction::Warn(Warning::UnknownType {
                    sender: sender.to_string(),
                    kind: unknown.kind,
                })])
            },
        }
    }

    /// Forget nonce history. Identity, peer keys and shared secrets survive.
    pub fn reset(&mut self) {
        tracing::debug!(name = %self.name, nonces = self.guard.len(), "resetting nonce history");
        self.guard.reset();
    }

    fn receive_message<I>(
        &mut self,
        sender: &str,
        message: &MessageEnvelope,
        roster: I,
    ) -> Vec<SessionAction>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut actions = Vec::new();

        let missing = codec::missing_recipients(
            message,
            roster,
            sender,
            &self.name,
            &self.config.broadcast_channel,
        );
        if !missing.is_empty() {
            tracing::warn!(sender = %sender, missing = ?missing, "message not sent to every participant");
            actions.push(SessionAction::Warn(Warning::MissingRecipients {
                sender: sender.to_string(),
                missing,
            }));
        }

        let Some(secret) = self.peers.shared_secret(sender) else {
            tracing::debug!(sender = %sender, "no shared secret with sender");
            return actions;
        };

        match codec::open(&self.name, message, secret, &mut self.guard) {
            Ok(plaintext) => {
                tracing::debug!(sender = %sender, len = plaintext.len(), "opened message");
                actions.push(SessionAction::Deliver { sender: sender.to_string(), plaintext });
            },
            Err(err) => {
                tracing::warn!(sender = %sender, error = %err, "discarding message");
                if let Some(warning) = warning_for(&err, sender) {
                    actions.push(SessionAction::Warn(warning));
                }
            },
        }

        actions
    }
}

fn warning_for(err: &OpenError, sender: &str) -> Option<Warning> {
    let sender = sender.to_string();
    match err {
        OpenError::AuthenticationFailure => Some(Warning::AuthenticationFailed { sender }),
        OpenError::ReplayDetected => Some(Warning::ReplayDetected { sender }),
        OpenError::TagMismatch => Some(Warning::TagMismatch { sender }),
        OpenError::MalformedPlaintext { .. } | OpenError::Crypto(_) => {
            Some(Warning::MalformedPlaintext { sender })
        },
        OpenError::MissingEntry { .. } => None,
    }
}
