//! Client error types.

use std::io;

use quicchat_proto::CodecError;
use thiserror::Error;

/// Errors that end a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid address, unreadable certificate or bad TLS setup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dialing or handshaking with the server failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Opening or writing a stream failed.
    #[error("stream error: {0}")]
    Stream(String),

    /// A message could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Reading user input failed.
    #[error("input error: {0}")]
    Input(#[from] io::Error),
}
