//! Fuzz target for Envelope::parse
//!
//! Feeds arbitrary bytes (as lossy UTF-8) to the envelope parser to find:
//! - Panics on odd JSON shapes (non-object `text`, nested arrays, huge numbers)
//! - Base64 fields that decode to lengths the codec does not expect
//! - Envelopes that parse but do not survive re-serialization
//!
//! The fuzzer should NEVER panic. Invalid input returns an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomseal_core::Envelope;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(envelope) = Envelope::parse(&raw) else {
        return;
    };

    let _ = envelope.is_addressed_to("alice");
    let _ = envelope.kind();

    // Whatever parsed must parse again to the same thing
    let reparsed = Envelope::parse(&envelope.to_json()).expect("serialized envelope must parse");
    assert_eq!(reparsed, envelope, "envelope changed across serialization");
});
