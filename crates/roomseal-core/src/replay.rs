//! Session-scoped nonce history.
//!
//! Every nonce this participant generates or accepts lands in one set. The set
//! only grows until an explicit [`ReplayGuard::reset`].
//!
//! # Invariants
//!
//! - `reserve_nonce` never returns a nonce already in the set
//! - `reject_if_reused` records a nonce the first time it is seen and refuses
//!   it every time after that
//! - Outgoing and incoming nonces share the set, so a peer cannot reflect one
//!   of our own nonces back at us

use std::collections::HashSet;

use roomseal_crypto::{NONCE_LEN, Nonce};

use crate::{env::Environment, error::SessionError};

/// Set of nonces used in this session.
#[derive(Debug, Clone)]
pub struct ReplayGuard {
    used: HashSet<Nonce>,
    max_attempts: u32,
}

impl ReplayGuard {
    /// Empty guard that retries nonce generation at most `max_attempts` times.
    pub fn new(max_attempts: u32) -> Self {
        Self { used: HashSet::new(), max_attempts }
    }

    /// Draw a fresh random nonce and record it.
    ///
    /// # Errors
    ///
    /// - `NonceExhausted`: every draw collided with a recorded nonce, which
    ///   means the random source is not random
    pub fn reserve_nonce<E: Environment>(&mut self, env: &E) -> Result<Nonce, SessionError> {
        for _ in 0..self.max_attempts {
            let nonce = Nonce::from_bytes(env.random_array::<NONCE_LEN>());
            if self.used.insert(nonce) {
                return Ok(nonce);
            }
        }

        Err(SessionError::NonceExhausted { attempts: self.max_attempts })
    }

    /// Record an externally presented nonce.
    ///
    /// Returns `true` if the nonce was unseen (and is now recorded), `false`
    /// if it was already used. `false` is an attack signal.
    pub fn reject_if_reused(&mut self, nonce: &Nonce) -> bool {
        self.used.insert(*nonce)
    }

    /// Whether a nonce is recorded.
    pub fn contains(&self, nonce: &Nonce) -> bool {
        self.used.contains(nonce)
    }

    /// Number of recorded nonces.
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// True if no nonce is recorded.
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Forget every recorded nonce.
    pub fn reset(&mut self) {
        self.used.clear();
    }
}
