//! Roomseal Core
//!
//! Sans-IO protocol engine for multi-party end-to-end encrypted chat rooms.
//! Participants exchange static X25519 keys, derive pairwise secrets, and send
//! each message once per recipient under a shared transcript HMAC and a global
//! tag that binds every recipient's authenticator together.
//!
//! # Architecture
//!
//! The engine receives events ([`SessionEvent`]), processes them through pure
//! state machine logic in [`Session`], and returns actions ([`SessionAction`])
//! for the host to execute. It never touches the network, the clock or the
//! OS random source; randomness comes through [`Environment`].
//!
//! # Components
//!
//! - [`Session`]: one participant's state for one room
//! - [`PeerStore`]: per-peer key pinning (`NoKey → KeyKnown`, never back)
//! - [`ReplayGuard`]: nonce history shared by the send and receive paths
//! - [`Envelope`]: typed wire envelope, validated once at parse time
//! - [`codec`]: message sealing, opening and completeness checking
//! - [`handshake`]: public key announcement and request handling
//!
//! # Failure model
//!
//! Every cryptographic failure fails closed. A message produces a
//! [`SessionAction::Deliver`] only when the recipient HMAC and the global tag
//! both verify; otherwise the host gets a [`SessionAction::Warn`] to show in
//! the conversation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod config;
pub mod env;
pub mod envelope;
mod error;
mod event;
pub mod handshake;
pub mod peer;
pub mod replay;
mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{PADDING_LEN, SessionConfig};
pub use env::Environment;
pub use envelope::{Envelope, MessageEnvelope, RecipientBlock, RecipientEntry};
pub use error::{EnvelopeError, OpenError, SessionError};
pub use event::{SessionAction, SessionEvent, Warning};
pub use peer::{PeerRecord, PeerState, PeerStore, PinOutcome};
pub use replay::ReplayGuard;
pub use roomseal_crypto::{Fingerprint, Nonce, PublicKey};
pub use session::Session;
