//! Wire protocol for quicchat.
//!
//! Three pieces live here:
//!
//! - [`Message`]: the unit moved in a single transport read or write, encoded
//!   as a small JSON document. At most [`MAX_FRAME_SIZE`] bytes per frame.
//! - [`FrameSplitter`]: recovers frames from reads that carry more than one.
//! - [`chat`]: text conventions carried inside CONTENT payloads
//!   (`"<username>: <text>"`, join/leave notices, the `/list` command).
//!
//! Both the server and the client depend on this crate; neither does any I/O
//! through it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod errors;
mod message;
mod splitter;

pub use errors::CodecError;
pub use message::{MAX_FRAME_SIZE, Message, MessageKind, frame_buffer};
pub use splitter::FrameSplitter;

/// ALPN identifier negotiated by client and server during the QUIC handshake.
pub const ALPN_PROTOCOL: &[u8] = b"quicchat";
