//! Session events and actions.

use std::fmt;

use roomseal_crypto::Fingerprint;

use crate::envelope::Envelope;

/// Events the host feeds into a session.
///
/// The host is responsible for:
/// - Receiving envelopes from the room transport
/// - Supplying the current room roster with each envelope
/// - Forwarding application intents (send message, request a key, reset)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Raw envelope received from a room participant.
    EnvelopeReceived {
        /// Transport-level name of the sender.
        sender: String,
        /// Envelope as received, not yet parsed.
        raw: String,
        /// Everyone currently in the room, as the transport sees it.
        roster: Vec<String>,
    },

    /// Application wants to send a message to every established peer.
    SendMessage {
        /// Message plaintext.
        plaintext: String,
    },

    /// Ask a peer for its public key.
    RequestPublicKey {
        /// Peer to ask.
        to: String,
    },

    /// Send our public key to a peer unprompted.
    AnnouncePublicKey {
        /// Peer to send it to.
        to: String,
    },

    /// Room-level reset: forget nonce history.
    Reset,
}

/// Actions the session produces for the host to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send an envelope to the whole room.
    Broadcast(Envelope),

    /// Send our public key envelope to one peer.
    SendPublicKey {
        /// Peer to send it to.
        to: String,
        /// Announcement addressed to that peer.
        envelope: Envelope,
    },

    /// Deliver verified plaintext to the application.
    Deliver {
        /// Peer that sent the message.
        sender: String,
        /// Decrypted, unpadded plaintext.
        plaintext: String,
    },

    /// A peer's key was pinned for the first time.
    ///
    /// The host should display the fingerprint so users can compare it
    /// out of band.
    PeerKeyPinned {
        /// Peer whose key was pinned.
        peer: String,
        /// Fingerprint of the pinned key.
        fingerprint: Fingerprint,
    },

    /// Show a security warning in the conversation.
    Warn(Warning),
}

/// User-facing security warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Recipient HMAC did not verify.
    AuthenticationFailed {
        /// Claimed sender.
        sender: String,
    },

    /// Nonce already used in this session.
    ReplayDetected {
        /// Claimed sender.
        sender: String,
    },

    /// Global tag did not match after the HMAC verified.
    ///
    /// Points at a sender giving different recipients different views.
    TagMismatch {
        /// Claimed sender.
        sender: String,
    },

    /// Decrypted payload shorter than the padding or not text.
    MalformedPlaintext {
        /// Claimed sender.
        sender: String,
    },

    /// Room participants left out of a message. The message is still
    /// processed.
    MissingRecipients {
        /// Claimed sender.
        sender: String,
        /// Participants without a well-formed entry, sorted.
        missing: Vec<String>,
    },

    /// Envelope `type` this engine does not understand.
    UnknownType {
        /// Claimed sender.
        sender: String,
        /// The unrecognised type.
        kind: String,
    },
}

impl Warning {
    /// Peer the warning is about.
    pub fn sender(&self) -> &str {
        match self {
            Self::AuthenticationFailed { sender }
            | Self::ReplayDetected { sender }
            | Self::TagMismatch { sender }
            | Self::MalformedPlaintext { sender }
            | Self::MissingRecipients { sender, .. }
            | Self::UnknownType { sender, .. } => sender,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationFailed { sender } => {
                write!(f, "message from {sender} failed authentication and was discarded")
            },
            Self::ReplayDetected { sender } => {
                write!(f, "message from {sender} reused a nonce, possible replay attack")
            },
            Self::TagMismatch { sender } => {
                write!(f, "message from {sender} has an inconsistent tag and was discarded")
            },
            Self::MalformedPlaintext { sender } => {
                write!(f, "message from {sender} has a malformed payload and was discarded")
            },
            Self::MissingRecipients { sender, missing } => {
                write!(f, "message from {sender} was not sent to: {}", missing.join(", "))
            },
            Self::UnknownType { sender, kind } => {
                write!(f, "{sender} sent an envelope of unknown type {kind:?}")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_sender() {
        let warning = Warning::MissingRecipients {
            sender: "alice".to_string(),
            missing: vec!["carol".to_string()],
        };
        assert_eq!(warning.sender(), "alice");
    }

    #[test]
    fn missing_recipients_lists_names() {
        let warning = Warning::MissingRecipients {
            sender: "alice".to_string(),
            missing: vec!["carol".to_string(), "dave".to_string()],
        };
        assert_eq!(warning.to_string(), "message from alice was not sent to: carol, dave");
    }

    #[test]
    fn unknown_type_quotes_kind() {
        let warning = Warning::UnknownType { sender: "bob".to_string(), kind: "typing".to_string() };
        assert_eq!(warning.to_string(), "bob sent an envelope of unknown type \"typing\"");
    }
}
