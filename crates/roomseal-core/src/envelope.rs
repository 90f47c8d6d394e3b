//! Typed wire envelopes.
//!
//! Every envelope travels as a JSON object:
//!
//! ```text
//! {
//!   "type": "publicKey" | "publicKeyRequest" | "message",
//!   "text": { "<peer>": { ... per-recipient fields ... }, ... },
//!   "tag":  "<base64>"          (message only)
//! }
//! ```
//!
//! [`Envelope::parse`] validates the structure once. Fields that are absent,
//! of the wrong JSON type, not valid base64 or of the wrong length are captured
//! as explicit `Malformed` entries instead of being probed later, so protocol
//! code only ever matches on typed variants.

use std::collections::{BTreeMap, BTreeSet};

use base64::{Engine, engine::general_purpose::STANDARD};
use roomseal_crypto::{Nonce, PublicKey};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::EnvelopeError;

/// `type` of a public key announcement.
pub const TYPE_PUBLIC_KEY: &str = "publicKey";

/// `type` of a public key request.
pub const TYPE_PUBLIC_KEY_REQUEST: &str = "publicKeyRequest";

/// `type` of an encrypted message.
pub const TYPE_MESSAGE: &str = "message";

/// A decoded envelope, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Sender announces its public key.
    PublicKey(PublicKeyEnvelope),
    /// Sender asks the recipients for their public keys.
    PublicKeyRequest(PublicKeyRequestEnvelope),
    /// Encrypted multi-recipient message.
    Message(MessageEnvelope),
    /// Any other `type`.
    Unknown(UnknownEnvelope),
}

/// Public key announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEnvelope {
    /// One entry per addressed peer.
    pub entries: BTreeMap<String, KeyEntry>,
}

/// A recipient's entry in a public key announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEntry {
    /// `message` field holding the base64-encoded key (not yet decoded).
    Encoded(String),
    /// Entry object without a string `message` field.
    Malformed(Value),
}

/// Request for the recipients' public keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRequestEnvelope {
    /// Addressed peers.
    pub recipients: BTreeSet<String>,
}

/// Encrypted message addressed to every peer with a shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Every entry of `text`, in lexicographic name order.
    pub recipients: BTreeMap<String, RecipientEntry>,
    /// Decoded global tag; `None` if absent or not base64.
    pub tag: Option<Vec<u8>>,
}

/// A recipient's entry in a message envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientEntry {
    /// Well-formed ciphertext, nonce and HMAC.
    Block(RecipientBlock),
    /// Anything else, kept verbatim.
    Malformed(Value),
}

/// Per-recipient ciphertext, nonce and authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientBlock {
    /// Padded plaintext encrypted under the recipient's key.
    pub ciphertext: Vec<u8>,
    /// Counter-mode nonce.
    pub iv: Nonce,
    /// HMAC of the transcript under the recipient's MAC key.
    pub hmac: Vec<u8>,
}

/// Envelope with an unrecognised `type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEnvelope {
    /// The `type` value as received (JSON-encoded if not a string).
    pub kind: String,
    /// Addressed peers.
    pub recipients: BTreeSet<String>,
}

/// Shape accepted at the boundary before typing.
#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type", default)]
    kind: Value,
    text: BTreeMap<String, Value>,
    #[serde(default)]
    tag: Option<Value>,
}

impl Envelope {
    /// Decode an envelope received from the transport.
    ///
    /// # Errors
    ///
    /// - `InvalidJson`: not JSON, not an object, or `text` missing or not an
    ///   object
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope = serde_json::from_str(raw)
            .map_err(|e| EnvelopeError::InvalidJson { reason: e.to_string() })?;

        let envelope = match wire.kind.as_str() {
            Some(TYPE_PUBLIC_KEY) => Self::PublicKey(PublicKeyEnvelope {
                entries: wire
                    .text
                    .into_iter()
                    .filter(|(_, entry)| entry.is_object())
                    .map(|(name, entry)| (name, KeyEntry::from_value(entry)))
                    .collect(),
            }),
            Some(TYPE_PUBLIC_KEY_REQUEST) => {
                Self::PublicKeyRequest(PublicKeyRequestEnvelope {
                    recipients: object_entries(wire.text),
                })
            },
            Some(TYPE_MESSAGE) => Self::Message(MessageEnvelope {
                recipients: wire
                    .text
                    .into_iter()
                    .map(|(name, entry)| (name, RecipientEntry::from_value(entry)))
                    .collect(),
                tag: wire.tag.as_ref().and_then(Value::as_str).and_then(decode),
            }),
            _ => Self::Unknown(UnknownEnvelope {
                kind: match wire.kind {
                    Value::String(kind) => kind,
                    other => other.to_string(),
                },
                recipients: object_entries(wire.text),
            }),
        };

        Ok(envelope)
    }

    /// Announcement of `key` addressed to `to`.
    pub fn public_key(to: &str, key: &PublicKey) -> Self {
        let entries = BTreeMap::from([(to.to_string(), KeyEntry::Encoded(key.to_base64()))]);
        Self::PublicKey(PublicKeyEnvelope { entries })
    }

    /// Request for `to`'s public key.
    pub fn public_key_request(to: &str) -> Self {
        Self::PublicKeyRequest(PublicKeyRequestEnvelope {
            recipients: BTreeSet::from([to.to_string()]),
        })
    }

    /// Wire name of this envelope's type.
    pub fn kind(&self) -> &str {
        match self {
            Self::PublicKey(_) => TYPE_PUBLIC_KEY,
            Self::PublicKeyRequest(_) => TYPE_PUBLIC_KEY_REQUEST,
            Self::Message(_) => TYPE_MESSAGE,
            Self::Unknown(unknown) => &unknown.kind,
        }
    }

    /// Whether `text` holds an entry object for `name`.
    pub fn is_addressed_to(&self, name: &str) -> bool {
        match self {
            Self::PublicKey(envelope) => envelope.entries.contains_key(name),
            Self::PublicKeyRequest(envelope) => envelope.recipients.contains(name),
            Self::Message(envelope) => {
                envelope.recipients.get(name).is_some_and(RecipientEntry::is_object)
            },
            Self::Unknown(envelope) => envelope.recipients.contains(name),
        }
    }

    /// JSON value as sent on the wire.
    pub fn to_value(&self) -> Value {
        let (text, tag) = match self {
            Self::PublicKey(envelope) => {
                let text = envelope
                    .entries
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.to_value()))
                    .collect();
                (text, None)
            },
            Self::PublicKeyRequest(PublicKeyRequestEnvelope { recipients })
            | Self::Unknown(UnknownEnvelope { recipients, .. }) => {
                let text = recipients
                    .iter()
                    .map(|name| (name.clone(), Value::Object(Map::new())))
                    .collect();
                (text, None)
            },
            Self::Message(envelope) => {
                let text = envelope
                    .recipients
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.to_value()))
                    .collect();
                (text, envelope.tag.as_deref().map(|tag| Value::String(STANDARD.encode(tag))))
            },
        };

        let mut object = Map::new();
        object.insert("type".to_string(), Value::String(self.kind().to_string()));
        object.insert("text".to_string(), Value::Object(text));
        if let Some(tag) = tag {
            object.insert("tag".to_string(), tag);
        }
        Value::Object(object)
    }

    /// Serialized JSON string.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

impl KeyEntry {
    fn from_value(entry: Value) -> Self {
        match entry.get("message").and_then(Value::as_str) {
            Some(encoded) => Self::Encoded(encoded.to_string()),
            None => Self::Malformed(entry),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Encoded(encoded) => {
                let mut object = Map::new();
                object.insert("message".to_string(), Value::String(encoded.clone()));
                Value::Object(object)
            },
            Self::Malformed(value) => value.clone(),
        }
    }
}

impl MessageEnvelope {
    /// Well-formed block for `name`, if present.
    pub fn block(&self, name: &str) -> Option<&RecipientBlock> {
        match self.recipients.get(name) {
            Some(RecipientEntry::Block(block)) => Some(block),
            _ => None,
        }
    }

    /// Every block in name order, or `None` if any entry of `text` is
    /// malformed.
    pub fn blocks(&self) -> Option<Vec<&RecipientBlock>> {
        self.recipients
            .values()
            .map(|entry| match entry {
                RecipientEntry::Block(block) => Some(block),
                RecipientEntry::Malformed(_) => None,
            })
            .collect()
    }
}

impl RecipientEntry {
    fn from_value(entry: Value) -> Self {
        match RecipientBlock::from_value(&entry) {
            Some(block) => Self::Block(block),
            None => Self::Malformed(entry),
        }
    }

    fn is_object(&self) -> bool {
        match self {
            Self::Block(_) => true,
            Self::Malformed(value) => value.is_object(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Block(block) => block.to_value(),
            Self::Malformed(value) => value.clone(),
        }
    }
}

impl RecipientBlock {
    fn from_value(entry: &Value) -> Option<Self> {
        let field = |key: &str| entry.get(key).and_then(Value::as_str);

        let ciphertext = decode(field("message")?)?;
        let iv = Nonce::from_base64(field("iv")?).ok()?;
        let hmac = decode(field("hmac")?)?;

        Some(Self { ciphertext, iv, hmac })
    }

    fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("message".to_string(), Value::String(STANDARD.encode(&self.ciphertext)));
        object.insert("iv".to_string(), Value::String(self.iv.to_base64()));
        object.insert("hmac".to_string(), Value::String(STANDARD.encode(&self.hmac)));
        Value::Object(object)
    }
}

fn decode(encoded: &str) -> Option<Vec<u8>> {
    STANDARD.decode(encoded).ok()
}

fn object_entries(text: BTreeMap<String, Value>) -> BTreeSet<String> {
    text.into_iter().filter(|(_, entry)| entry.is_object()).map(|(name, _)| name).collect()
}
