//! Fuzz target for Message::decode
//!
//! Arbitrary bytes arrive on every stream read. Decoding should NEVER panic;
//! invalid input returns an error. Anything that decodes also encodes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use quicchat_proto::{Message, chat};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = Message::decode(data) {
        let _ = message.encode();

        // The server splits every decoded payload as a chat line
        let text = message.text();
        let _ = chat::split(&text);
    }
});
