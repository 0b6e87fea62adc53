//! Per-connection session handler.
//!
//! Accepts bidirectional streams until the connection goes away. Every stream
//! is registered, greeted, and handed to its own protocol handler task. The
//! session owns those tasks and waits for all of them before it returns.

use std::sync::Arc;

use quicchat_proto::{Message, chat};
use quinn::SendStream;
use tokio::task::JoinSet;

use crate::{
    protocol,
    registry::Registry,
    transport::{IncomingConnection, QuinnConnection},
};

/// Complete the handshake of `incoming`, then serve it.
///
/// Runs in the connection's own task, off the server's accept loop.
pub async fn handle_incoming(incoming: IncomingConnection, registry: Arc<Registry<SendStream>>) {
    let remote_addr = incoming.remote_addr();

    match incoming.handshake().await {
        Ok(conn) => handle_connection(conn, registry).await,
        Err(e) => tracing::warn!(%remote_addr, error = %e, "handshake failed"),
    }
}

/// Serve one QUIC connection until it closes.
pub async fn handle_connection(conn: QuinnConnection, registry: Arc<Registry<SendStream>>) {
    let remote_addr = conn.remote_addr();
    tracing::info!(%remote_addr, "connection accepted");

    let mut streams = JoinSet::new();

    loop {
        let (send, recv) = match conn.accept_bi().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(%remote_addr, error = %e, "stopped accepting streams");
                break;
            },
        };

        let stream_id = registry.register(send, remote_addr).await;

        if let Err(e) = registry.send_to(stream_id, &Message::content(chat::WELCOME)).await {
            tracing::warn!(stream_id, error = %e, "failed to send welcome");
        }

        let registry = Arc::clone(&registry);
        streams.spawn(async move {
            let reason = protocol::handle_stream(stream_id, recv, &registry).await;
            tracing::debug!(stream_id, ?reason, "stream handler exited");
        });

        // Reap handlers of streams that already closed
        while streams.try_join_next().is_some() {}
    }

    conn.close(0u32.into(), b"session closed");

    while streams.join_next().await.is_some() {}
    tracing::info!(%remote_addr, "connection closed");
}
