//! Fuzz target for Payload::from_frame
//!
//! Feeds arbitrary bodies through a MESSAGE frame into every payload type a
//! subscription can deliver: chat messages, read receipts, presence updates.
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::{
    Command, Frame, header,
    payloads::{ChatMessage, Payload, PresenceUpdate},
};

fuzz_target!(|data: &[u8]| {
    let frame = Frame::new(Command::Message)
        .with_header(header::DESTINATION, "/topic/public")
        .with_body(data.to_vec());

    let _ = ChatMessage::from_frame(&frame);
    let _ = PresenceUpdate::from_frame(&frame);
});
