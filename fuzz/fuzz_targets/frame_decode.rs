//! Fuzz target for Packet::decode
//!
//! Broker input arrives as arbitrary WebSocket text. Decoding finds:
//! - Parser panics on truncated or unterminated frames
//! - Slicing errors around `content-length`
//! - Header escapes that bypass validation
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::Packet;

fuzz_target!(|data: &[u8]| {
    let _ = Packet::decode(data);
});
