//! Fuzz target for FrameSplitter
//!
//! # Invariants
//!
//! - Any chunking of a sequence of valid frames yields exactly those frames,
//!   in order, with nothing left pending
//! - Arbitrary bytes never panic the splitter

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quicchat_proto::{FrameSplitter, Message, MessageKind};

#[derive(Debug, Arbitrary)]
struct Input {
    messages: Vec<(u8, String)>,
    cuts: Vec<u16>,
    garbage: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let messages: Vec<Message> = input
        .messages
        .iter()
        .take(16)
        .filter_map(|(kind, text)| {
            let kind = MessageKind::try_from(kind % 4).ok()?;
            let message = Message::new(kind, text.clone().into_bytes());
            message.encode_frame().is_ok().then_some(message)
        })
        .collect();

    let mut stream = Vec::new();
    for message in &messages {
        stream.extend_from_slice(&message.encode_frame().expect("filtered to fitting frames"));
    }

    let mut splitter = FrameSplitter::new();
    let mut received = Vec::new();
    let mut rest = stream.as_slice();
    for cut in &input.cuts {
        if rest.is_empty() {
            break;
        }
        let at = usize::from(*cut) % (rest.len() + 1);
        let (chunk, tail) = rest.split_at(at);
        received.extend(splitter.push(chunk).expect("valid frames split cleanly"));
        rest = tail;
    }
    received.extend(splitter.push(rest).expect("valid frames split cleanly"));

    assert_eq!(received, messages);
    assert_eq!(splitter.pending_len(), 0);

    let _ = FrameSplitter::new().push(&input.garbage);
});
