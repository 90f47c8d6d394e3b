//! Relay error types.

use roomseal_core::SessionError;
use thiserror::Error;

/// Errors from driving sessions through the in-memory room.
#[derive(Debug, Error)]
pub enum SimError {
    /// Name is already taken in this room
    #[error("participant {name} already joined")]
    DuplicateParticipant {
        /// Requested name
        name: String,
    },

    /// Name does not belong to anyone in this room
    #[error("unknown participant {name}")]
    UnknownParticipant {
        /// Requested name
        name: String,
    },

    /// Name collides with the broadcast pseudo-peer
    #[error("{name} is reserved for the room broadcast channel")]
    ReservedName {
        /// Requested name
        name: String,
    },

    /// A participant's session hit an error it cannot recover from
    #[error("session for {participant} failed: {source}")]
    Session {
        /// Participant whose session failed
        participant: String,
        /// Underlying session error
        #[source]
        source: SessionError,
    },
}
