//! Fuzz target for inbound frame decoding.
//!
//! Feeds arbitrary text through `MessageRouter::route`.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input; errors are counted as dropped frames
//! - A routed message re-encodes and decodes to the same message
//! - The invalidation keys depend only on the decoded kind

#![no_main]

use libfuzzer_sys::fuzz_target;
use pulsewire_core::{MessageRouter, affected_keys};
use pulsewire_proto::InboundMessage;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut router = MessageRouter::new();
    match router.route(text) {
        Ok(routed) => {
            assert_eq!(routed.keys, affected_keys(routed.message.kind()));
            let encoded = routed.message.encode().expect("decoded message re-encodes");
            let decoded = InboundMessage::decode(&encoded).expect("re-encoded message decodes");
            assert_eq!(decoded, routed.message);
        },
        Err(_) => assert_eq!(router.dropped(), 1),
    }
});
