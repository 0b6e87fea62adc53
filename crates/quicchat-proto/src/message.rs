//! Wire message and its JSON codec.
//!
//! A [`Message`] is moved as one JSON document per transport read or write:
//!
//! ```text
//! {"mtype":0,"len":2,"data":"aGk="}
//! ```
//!
//! `data` carries the payload in standard padded base64. Field names, field
//! order and the base64 alphabet are fixed, so existing peers keep
//! interoperating byte for byte.
//!
//! # Invariants
//!
//! - Advisory Length: `len` is filled in by [`Message::new`] but never checked
//!   by [`Message::decode`]. The payload is whatever the document carries, and
//!   the document boundary is whatever the transport read returned.
//!
//! - Frame Bound: a frame is at most [`MAX_FRAME_SIZE`] bytes. Readers use a
//!   buffer of exactly that size, so a longer frame arrives truncated and fails
//!   to decode. [`Message::encode_frame`] refuses to produce such a frame.

use std::{borrow::Cow, fmt};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::errors::{CodecError, Result};

/// Upper bound for one frame, and the size of every read buffer.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Zeroed read buffer of [`MAX_FRAME_SIZE`] bytes.
pub fn frame_buffer() -> BytesMut {
    BytesMut::zeroed(MAX_FRAME_SIZE)
}

/// Message type carried in the `mtype` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Chat content, welcome text, `/list` replies
    Content = 0,
    /// Participant joined
    Join = 1,
    /// Participant left
    Leave = 2,
    /// Acknowledgement (reserved, never sent by this implementation)
    Ack = 3,
}

impl MessageKind {
    /// Every known kind, in wire order.
    pub const ALL: [Self; 4] = [Self::Content, Self::Join, Self::Leave, Self::Ack];

    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Content => "DATA",
            Self::Join => "JOIN",
            Self::Leave => "LEAVE",
            Self::Ack => "ACK",
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Content),
            1 => Ok(Self::Join),
            2 => Ok(Self::Leave),
            3 => Ok(Self::Ack),
            other => Err(CodecError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One chat protocol message.
///
/// Fields are public because `len` is allowed to disagree with the payload
/// after decoding. Use [`Message::new`] (or the kind shortcuts) to build a
/// message with a consistent `len`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireMessage", try_from = "WireMessage")]
pub struct Message {
    /// Message type
    pub kind: MessageKind,
    /// Declared payload length (advisory)
    pub len: u32,
    /// Raw payload, displayed as UTF-8
    pub payload: Bytes,
}

impl Message {
    /// Create a message whose `len` matches the payload.
    ///
    /// A payload longer than `u32::MAX` saturates `len`; [`Message::encode`]
    /// rejects it.
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        Self { kind, len, payload }
    }

    /// CONTENT message.
    pub fn content(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Content, text.into())
    }

    /// JOIN message.
    pub fn join(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Join, text.into())
    }

    /// LEAVE message.
    pub fn leave(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Leave, text.into())
    }

    /// Payload as text. Invalid UTF-8 is replaced, never rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Serialize to the wire document.
    ///
    /// # Errors
    ///
    /// - `CodecError::Encode` if the payload length does not fit the `u32`
    ///   length field.
    pub fn encode(&self) -> Result<Bytes> {
        if u32::try_from(self.payload.len()).is_err() {
            return Err(CodecError::Encode(format!(
                "payload of {} bytes overflows the length field",
                self.payload.len()
            )));
        }

        serde_json::to_vec(self).map(Bytes::from).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Serialize to the wire document, enforcing the frame bound.
    ///
    /// # Errors
    ///
    /// - `CodecError::FrameTooLarge` if the document exceeds
    ///   [`MAX_FRAME_SIZE`]
    /// - anything [`Message::encode`] returns
    pub fn encode_frame(&self) -> Result<Bytes> {
        let bytes = self.encode()?;
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge { size: bytes.len(), max: MAX_FRAME_SIZE });
        }
        Ok(bytes)
    }

    /// Parse exactly one wire document.
    ///
    /// Trailing bytes after the document are an error, so two frames coalesced
    /// into one read do not decode.
    ///
    /// # Errors
    ///
    /// - `CodecError::Malformed` for invalid JSON, truncated input, trailing
    ///   data, bad base64, or an unknown kind
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.text())
    }
}

/// Field-for-field image of the wire document.
///
/// Missing fields take their zero value and `"data": null` is an empty
/// payload, which is how older peers behave.
#[derive(Serialize, Deserialize)]
struct WireMessage {
    #[serde(default)]
    mtype: u8,
    #[serde(default)]
    len: u32,
    #[serde(default, with = "base64_data")]
    data: Bytes,
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        Self { mtype: message.kind.into(), len: message.len, data: message.payload }
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = CodecError;

    fn try_from(wire: WireMessage) -> Result<Self> {
        Ok(Self { kind: MessageKind::try_from(wire.mtype)?, len: wire.len, payload: wire.data })
    }
}

mod base64_data {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => {
                STANDARD.decode(encoded.as_bytes()).map(Bytes::from).map_err(de::Error::custom)
            },
            None => Ok(Bytes::new()),
        }
    }
}
