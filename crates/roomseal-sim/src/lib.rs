//! In-memory room simulator for roomseal sessions.
//!
//! Wires several [`roomseal_core::Session`]s to a shared relay so a whole
//! room can be exercised in one process: key exchange on join, broadcast
//! messages, tampering and replay.
//!
//! # Components
//!
//! - [`Room`]: participant registry, FIFO delivery queue and event log
//! - [`SystemEnv`]: OS-backed randomness for real runs
//! - [`SimError`]: relay failures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod relay;
mod system_env;

pub use error::SimError;
pub use relay::{InFlight, Room, RoomEvent};
pub use system_env::SystemEnv;
