//! quicchat client.
//!
//! Dials a quicchat server over QUIC, announces the user, relays typed lines
//! as chat messages and prints whatever the server broadcasts.
//!
//! # Components
//!
//! - [`ChatClient`]: join / send / receive / leave lifecycle
//! - [`ChatConnection`]: dialed QUIC connection and its endpoint
//! - [`client_tls_config`]: TLS trust setup (pinned certificate or insecure)
//! - [`receive_loop`], [`input_loop`]: the two halves of an interactive session

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod transport;

pub use client::{ChatClient, ClientConfig, input_loop, receive_loop};
pub use error::ClientError;
pub use transport::{ChatConnection, client_tls_config};
