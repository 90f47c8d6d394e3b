//! Per-peer key state with trust-on-first-use pinning.
//!
//! A peer starts in [`PeerState::NoKey`]. The first usable public key it
//! announces moves it to [`PeerState::KeyKnown`], at which point the shared
//! secret and fingerprint are derived once and cached. The transition is
//! one-way: later announcements never replace a pinned key.

use std::collections::{BTreeMap, HashMap, hash_map::Entry};

use roomseal_crypto::{CryptoError, Fingerprint, IdentityKeyPair, PublicKey, SharedSecret};

/// Key material cached for a peer whose public key is pinned.
#[derive(Debug, Clone)]
pub struct KnownPeer {
    public_key: PublicKey,
    shared_secret: SharedSecret,
    fingerprint: Fingerprint,
}

impl KnownPeer {
    /// Pinned public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Encryption and MAC keys shared with this peer.
    pub fn shared_secret(&self) -> &SharedSecret {
        &self.shared_secret
    }

    /// Fingerprint of the pinned key.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Pinning state of one peer.
#[derive(Debug, Clone, Default)]
pub enum PeerState {
    /// No key received yet.
    #[default]
    NoKey,
    /// Key pinned and shared secret derived.
    KeyKnown(KnownPeer),
}

/// Result of offering a public key to a peer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    /// First key for this peer; derivation succeeded.
    Pinned(Fingerprint),
    /// A key was already pinned; the offered key was ignored.
    AlreadyPinned,
}

/// Everything this participant knows about one peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    name: String,
    state: PeerState,
}

impl PeerRecord {
    /// Record for a peer with no key yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: PeerState::NoKey }
    }

    /// Peer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current pinning state.
    pub fn state(&self) -> &PeerState {
        &self.state
    }

    /// Pinned key material, if any.
    pub fn known(&self) -> Option<&KnownPeer> {
        match &self.state {
            PeerState::KeyKnown(known) => Some(known),
            PeerState::NoKey => None,
        }
    }

    /// Pinned public key, if any.
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.known().map(KnownPeer::public_key)
    }

    /// Shared secret, if a key is pinned.
    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        self.known().map(KnownPeer::shared_secret)
    }

    /// Fingerprint of the pinned key, if any.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.known().map(KnownPeer::fingerprint)
    }

    /// Offer a public key announced by this peer.
    ///
    /// On the first call the shared secret is derived against `identity` and
    /// the key is pinned. Once pinned, every later offer returns
    /// `AlreadyPinned` without touching the stored state.
    ///
    /// # Errors
    ///
    /// - `NonContributory`: the key is a low-order point; the record stays
    ///   in `NoKey`
    pub fn pin(
        &mut self,
        public_key: PublicKey,
        identity: &IdentityKeyPair,
    ) -> Result<PinOutcome, CryptoError> {
        if matches!(self.state, PeerState::KeyKnown(_)) {
            return Ok(PinOutcome::AlreadyPinned);
        }

        let shared_secret = SharedSecret::derive(identity, &public_key)?;
        let fingerprint = Fingerprint::of(&public_key);

        self.state = PeerState::KeyKnown(KnownPeer {
            public_key,
            shared_secret,
            fingerprint: fingerprint.clone(),
        });

        Ok(PinOutcome::Pinned(fingerprint))
    }
}

/// All peer records of a session, keyed by name.
///
/// # Invariants
///
/// - At most one record per peer name
/// - Records are never removed, so a pinned key survives for the session
#[derive(Debug, Clone, Default)]
pub struct PeerStore {
    records: HashMap<String, PeerRecord>,
}

impl PeerStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `name`, created in `NoKey` if absent.
    pub fn get_or_insert(&mut self, name: &str) -> &mut PeerRecord {
        self.records.entry(name.to_string()).or_insert_with(|| PeerRecord::new(name))
    }

    /// Store `record`, replacing an unpinned record of the same name.
    ///
    /// A pinned record is never replaced; the stored record is returned
    /// either way.
    pub fn insert(&mut self, record: PeerRecord) -> &mut PeerRecord {
        match self.records.entry(record.name.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().known().is_none() {
                    slot.insert(record);
                }
                slot.into_mut()
            },
            Entry::Vacant(slot) => slot.insert(record),
        }
    }

    /// Record for `name`, if one exists.
    pub fn get(&self, name: &str) -> Option<&PeerRecord> {
        self.records.get(name)
    }

    /// Shared secret with `name`, if its key is pinned.
    pub fn shared_secret(&self, name: &str) -> Option<&SharedSecret> {
        self.get(name).and_then(PeerRecord::shared_secret)
    }

    /// Fingerprint of `name`'s pinned key.
    pub fn fingerprint(&self, name: &str) -> Option<&Fingerprint> {
        self.get(name).and_then(PeerRecord::fingerprint)
    }

    /// Every peer with a shared secret, in lexicographic name order.
    ///
    /// The order is by UTF-8 bytes, which is the order every roomseal peer
    /// builds transcripts in. It is not UTF-16 code-unit order: the two
    /// disagree when names mix characters above U+FFFF with characters in
    /// U+E000..=U+FFFF, so a peer sorting by UTF-16 would compute a different
    /// transcript for such a room.
    pub fn established(&self) -> BTreeMap<&str, &SharedSecret> {
        self.records
            .values()
            .filter_map(|record| record.shared_secret().map(|secret| (record.name(), secret)))
            .collect()
    }

    /// Number of records (pinned or not).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no peer has been seen.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(fill: u8) -> IdentityKeyPair {
        IdentityKeyPair::from_random([fill; 32])
    }

    #[test]
    fn new_record_has_no_key() {
        let record = PeerRecord::new("bob");
        assert_eq!(record.name(), "bob");
        assert!(matches!(record.state(), PeerState::NoKey));
        assert!(record.shared_secret().is_none());
        assert!(record.fingerprint().is_none());
    }

    #[test]
    fn first_key_is_pinned() {
        let alice = identity(1);
        let bob = identity(2);
        let mut record = PeerRecord::new("bob");

        let outcome = record.pin(bob.public_key(), &alice).unwrap();

        let expected = Fingerprint::of(&bob.public_key());
        assert_eq!(outcome, PinOutcome::Pinned(expected.clone()));
        assert_eq!(record.public_key(), Some(&bob.public_key()));
        assert_eq!(record.fingerprint(), Some(&expected));
        assert_eq!(
            record.shared_secret(),
            Some(&SharedSecret::derive(&alice, &bob.public_key()).unwrap())
        );
    }

    #[test]
    fn second_key_never_overwrites() {
        let alice = identity(1);
        let bob = identity(2);
        let mallory = identity(3);
        let mut record = PeerRecord::new("bob");

        record.pin(bob.public_key(), &alice).unwrap();
        let outcome = record.pin(mallory.public_key(), &alice).unwrap();

        assert_eq!(outcome, PinOutcome::AlreadyPinned);
        assert_eq!(record.public_key(), Some(&bob.public_key()));
    }

    #[test]
    fn low_order_key_leaves_record_unpinned() {
        let mut record = PeerRecord::new("bob");
        let result = record.pin(PublicKey::from_bytes([0; 32]), &identity(1));

        assert_eq!(result, Err(CryptoError::NonContributory));
        assert!(matches!(record.state(), PeerState::NoKey));
    }

    #[test]
    fn store_keeps_one_record_per_name() {
        let mut store = PeerStore::new();
        store.get_or_insert("bob");
        store.get_or_insert("bob");
        store.get_or_insert("carol");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn established_is_sorted_and_skips_unpinned() {
        let alice = identity(1);
        let mut store = PeerStore::new();

        store.get_or_insert("zoe").pin(identity(4).public_key(), &alice).unwrap();
        store.get_or_insert("bob").pin(identity(2).public_key(), &alice).unwrap();
        store.get_or_insert("carol");

        let names: Vec<&str> = store.established().into_keys().collect();
        assert_eq!(names, vec!["bob", "zoe"]);
        assert!(store.shared_secret("carol").is_none());
        assert!(store.fingerprint("bob").is_some());
    }

    #[test]
    fn insert_never_replaces_pinned_record() {
        let alice = identity(1);
        let mut store = PeerStore::new();

        let mut pinned = PeerRecord::new("bob");
        pinned.pin(identity(2).public_key(), &alice).unwrap();
        store.insert(pinned);

        let record = store.insert(PeerRecord::new("bob"));
        assert_eq!(record.public_key(), Some(&identity(2).public_key()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn established_orders_by_utf8_bytes() {
        let alice = identity(1);
        let mut store = PeerStore::new();

        // U+1F600 sorts before U+FF21 by UTF-16 code units, after it by UTF-8
        for (name, fill) in [("\u{1F600}", 2), ("\u{FF21}", 3)] {
            store.get_or_insert(name).pin(identity(fill).public_key(), &alice).unwrap();
        }

        let names: Vec<&str> = store.established().into_keys().collect();
        assert_eq!(names, vec!["\u{FF21}", "\u{1F600}"]);
    }
}
