//! Public key exchange.
//!
//! Bootstrap is mutual: whoever learns a peer's key for the first time answers
//! with its own, so a single announcement or request is enough for both sides
//! to end up with the shared secret.
//!
//! ```text
//! Alice                               Bob
//!   │── publicKeyRequest ───────────────▶│
//!   │◀────────────── publicKey(Bob) ─────│
//!   │ pin Bob, derive                     │
//!   │── publicKey(Alice) ───────────────▶│
//!   │                          pin Alice, derive
//!   │◀────────────── publicKey(Bob) ─────│  (ignored, already pinned)
//! ```

use roomseal_crypto::{IdentityKeyPair, PublicKey};

use crate::{
    envelope::{Envelope, KeyEntry},
    error::SessionError,
    event::SessionAction,
    peer::{PeerRecord, PeerStore, PinOutcome},
};

/// Action sending our public key to `to`.
pub fn announce(identity: &IdentityKeyPair, to: &str) -> SessionAction {
    SessionAction::SendPublicKey {
        to: to.to_string(),
        envelope: Envelope::public_key(to, &identity.public_key()),
    }
}

/// Action broadcasting a request for `to`'s public key.
pub fn request(to: &str) -> SessionAction {
    SessionAction::Broadcast(Envelope::public_key_request(to))
}

/// Handle the local entry of a `publicKey` envelope from `sender`.
///
/// First key wins: once a key is pinned for `sender`, later announcements are
/// ignored without being decoded.
///
/// # Errors
///
/// - `InvalidPublicKey`: not base64, not 32 bytes, or a low-order point. The
///   peer stays unpinned.
pub fn accept_public_key(
    peers: &mut PeerStore,
    identity: &IdentityKeyPair,
    sender: &str,
    entry: &KeyEntry,
) -> Result<Vec<SessionAction>, SessionError> {
    let KeyEntry::Encoded(encoded) = entry else {
        tracing::debug!(sender = %sender, "public key envelope without a key");
        return Ok(Vec::new());
    };

    if peers.get(sender).and_then(PeerRecord::public_key).is_some() {
        tracing::debug!(sender = %sender, "ignoring repeated public key");
        return Ok(Vec::new());
    }

    let invalid = |reason: String| SessionError::InvalidPublicKey { peer: sender.to_string(), reason };

    // Only a key that pins cleanly creates a record
    let public_key = PublicKey::from_base64(encoded).map_err(|e| invalid(e.to_string()))?;
    let mut record = PeerRecord::new(sender);
    match record.pin(public_key, identity).map_err(|e| invalid(e.to_string()))? {
        PinOutcome::Pinned(fingerprint) => {
            peers.insert(record);
            tracing::debug!(peer = %sender, fingerprint = %fingerprint, "pinned peer key");
            Ok(vec![
                SessionAction::PeerKeyPinned { peer: sender.to_string(), fingerprint },
                announce(identity, sender),
            ])
        },
        PinOutcome::AlreadyPinned => Ok(Vec::new()),
    }
}
