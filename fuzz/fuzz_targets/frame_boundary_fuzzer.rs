//! Fuzz target for frame size boundaries
//!
//! # Strategy
//!
//! - Kind: every valid kind plus arbitrary out-of-range values
//! - Advisory length: honest, zero, off-by-one, `u32::MAX`, random
//! - Payload: empty, small, around the largest size that fits a frame, random
//!
//! # Invariants
//!
//! - `encode_frame` succeeds exactly when the encoding fits `MAX_FRAME_SIZE`
//! - A frame that fits decodes back to the same kind and payload
//! - The advisory length never affects decoding
//! - Out-of-range kinds never decode

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quicchat_proto::{CodecError, MAX_FRAME_SIZE, Message, MessageKind};

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryFrame {
    kind: KindByte,
    len: AdvisoryLen,
    payload: PayloadShape,
}

#[derive(Debug, Clone, Arbitrary)]
enum KindByte {
    Valid(u8),
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum AdvisoryLen {
    Honest,
    Zero,
    OffByOne,
    Max,
    Random(u32),
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadShape {
    Empty,
    Small(Vec<u8>),
    NearLimit { fill: u8, delta: i8 },
    Random(Vec<u8>),
}

impl PayloadShape {
    fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Empty => Vec::new(),
            Self::Small(bytes) => bytes.iter().take(32).copied().collect(),
            Self::NearLimit { fill, delta } => {
                let size = (744_i32 + i32::from(*delta)).max(0) as usize;
                vec![*fill; size]
            },
            Self::Random(bytes) => bytes.clone(),
        }
    }
}

fuzz_target!(|input: BoundaryFrame| {
    let payload = input.payload.bytes();

    let kind_byte = match input.kind {
        KindByte::Valid(b) => b % 4,
        KindByte::Random(b) => b,
    };

    let len = match input.len {
        AdvisoryLen::Honest => payload.len() as u32,
        AdvisoryLen::Zero => 0,
        AdvisoryLen::OffByOne => payload.len() as u32 + 1,
        AdvisoryLen::Max => u32::MAX,
        AdvisoryLen::Random(n) => n,
    };

    let Ok(kind) = MessageKind::try_from(kind_byte) else {
        // Hand-build the document, since no Message can carry this kind
        let doc = format!(r#"{{"mtype":{kind_byte},"len":{len},"data":""}}"#);
        assert!(Message::decode(doc.as_bytes()).is_err(), "kind {kind_byte} decoded");
        return;
    };

    let mut message = Message::new(kind, payload.clone());
    message.len = len;

    let encoded = message.encode().expect("encoding a message never fails");

    match message.encode_frame() {
        Ok(frame) => {
            assert!(frame.len() <= MAX_FRAME_SIZE);
            assert_eq!(frame, encoded);

            let decoded = Message::decode(&frame).expect("a fitting frame decodes");
            assert_eq!(decoded.kind, kind);
            assert_eq!(decoded.payload.as_ref(), payload.as_slice());
            assert_eq!(decoded.len, len);
        },
        Err(CodecError::FrameTooLarge { size, max }) => {
            assert_eq!(size, encoded.len());
            assert_eq!(max, MAX_FRAME_SIZE);
            assert!(size > MAX_FRAME_SIZE);

            // What a reader with a frame-sized buffer would see
            assert!(Message::decode(&encoded[..MAX_FRAME_SIZE]).is_err());
        },
        Err(e) => panic!("unexpected error: {e}"),
    }
});
