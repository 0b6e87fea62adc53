//! Server error types.

use std::fmt;

use quicchat_proto::CodecError;

use crate::registry::StreamId;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unresolvable bind address, unreadable TLS
    /// material, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (endpoint creation, stream write, etc.).
    ///
    /// Ends the task that hit it. Other connections keep running.
    Transport(String),

    /// Message could not be encoded into a frame.
    ///
    /// Only the affected send is dropped.
    Codec(CodecError),

    /// Stream is not (or no longer) in the registry.
    ///
    /// Usually a race with the stream's own cleanup. Harmless.
    StreamNotFound(StreamId),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Codec(err) => write!(f, "codec error: {err}"),
            Self::StreamNotFound(id) => write!(f, "stream not found: {id}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CodecError> for ServerError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
