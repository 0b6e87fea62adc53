//! quicchat relay server.
//!
//! Accepts QUIC connections, tracks every open stream in a [`Registry`], and
//! fans chat messages out to all of them.
//!
//! # Components
//!
//! - [`Registry`]: stream -> participant map plus the broadcaster
//! - [`session`]: per-connection handshake, then a loop that accepts and
//!   greets streams
//! - [`protocol`]: per-stream read loop, `/list` handling and cleanup
//! - [`QuinnTransport`]: QUIC endpoint via Quinn
//! - [`Server`]: binds the transport, owns the registry, runs the accept loop
//!
//! # Tasks
//!
//! One task per connection, one per stream. The server owns the connection
//! tasks and each connection owns its stream tasks, so
//! [`Server::run_until`] can wait for every one of them on shutdown.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod protocol;
mod registry;
pub mod session;
mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc};

pub use error::ServerError;
pub use protocol::CloseReason;
use quinn::SendStream;
pub use registry::{BroadcastReport, Participant, Registry, StreamId};
use tokio::task::JoinSet;
pub use transport::{IncomingConnection, QuinnConnection, QuinnTransport};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Host or IP to listen on
    pub address: String,
    /// UDP port to listen on (0 picks a free port)
    pub port: u16,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
}

impl ServerRuntimeConfig {
    /// `host:port` string, with IPv6 literals bracketed.
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { address: "localhost".to_string(), port: 4242, cert_path: None, key_path: None }
    }
}

/// Production quicchat server.
pub struct Server {
    transport: QuinnTransport,
    registry: Arc<Registry<SendStream>>,
}

impl Server {
    /// Create and bind a new server with an empty registry.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let transport = QuinnTransport::bind(
            &config.bind_address(),
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { transport, registry: Arc::new(Registry::new()) })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Handle to the registry shared by every session.
    pub fn registry(&self) -> Arc<Registry<SendStream>> {
        Arc::clone(&self.registry)
    }

    /// Run until the process is killed.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` completes.
    ///
    /// On shutdown the endpoint is closed, which ends every connection, and the
    /// call returns once all session tasks have finished their cleanup.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Server { transport, registry } = self;
        tokio::pin!(shutdown);

        tracing::info!("Server accepting connections on {}", transport.local_addr()?);

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Server shutting down");
                    transport.close();
                    break;
                }
                incoming = transport.accept() => match incoming {
                    Some(incoming) => {
                        sessions.spawn(session::handle_incoming(incoming, Arc::clone(&registry)));
                    },
                    None => {
                        tracing::info!("Endpoint closed");
                        break;
                    },
                },
            }

            while sessions.try_join_next().is_some() {}
        }

        while sessions.join_next().await.is_some() {}
        transport.wait_idle().await;

        Ok(())
    }
}
