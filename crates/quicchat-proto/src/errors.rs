//! Error types for the wire codec.
//!
//! Decoding failures are reported as [`CodecError::Malformed`] regardless of
//! which part of the document was wrong. Callers treat every decode failure
//! the same way (the stream is done), so the variant carries a message for the
//! logs rather than a structured cause.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced while encoding or decoding a [`Message`](crate::Message).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload cannot be represented on the wire.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Serialized message does not fit in one frame.
    ///
    /// Readers use a fixed buffer of [`MAX_FRAME_SIZE`](crate::MAX_FRAME_SIZE)
    /// bytes, so sending this frame would deliver a truncated document.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Serialized size in bytes
        size: usize,
        /// Frame bound in bytes
        max: usize,
    },

    /// Buffer is not a well-formed serialized message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Message kind outside the known set.
    #[error("unknown message kind: {0}")]
    UnknownKind(u8),
}
