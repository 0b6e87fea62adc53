//! Per-stream protocol handler.
//!
//! Reads one frame per transport read, updates the registry from chat lines,
//! answers `/list` directly and relays everything else to all streams. When the
//! read loop ends, for any reason, the stream is unregistered, its write half
//! is shut down and a LEAVE notice is broadcast. Cleanup runs exactly once.

use quicchat_proto::{Message, chat, frame_buffer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::registry::{Registry, StreamId};

/// Why a stream handler stopped reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer finished its side of the stream
    Finished,
    /// Read failed (connection lost, stream reset)
    ReadFailed(String),
    /// Peer sent a frame that does not decode
    Malformed(String),
}

/// Drive one stream until it closes, then clean up.
///
/// The stream must already be registered under `stream_id`.
pub async fn handle_stream<R, W>(
    stream_id: StreamId,
    mut reader: R,
    registry: &Registry<W>,
) -> CloseReason
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut buf = frame_buffer();

    let reason = loop {
        let n = match reader.read(&mut buf[..]).await {
            Ok(0) => break CloseReason::Finished,
            Ok(n) => n,
            Err(e) => break CloseReason::ReadFailed(e.to_string()),
        };

        let message = match Message::decode(&buf[..n]) {
            Ok(message) => message,
            Err(e) => break CloseReason::Malformed(e.to_string()),
        };

        handle_message(stream_id, message, registry).await;
    };

    match &reason {
        CloseReason::Finished => tracing::debug!(stream_id, "stream finished"),
        CloseReason::ReadFailed(e) => tracing::debug!(stream_id, error = %e, "stream read failed"),
        CloseReason::Malformed(e) => tracing::warn!(stream_id, error = %e, "malformed frame"),
    }

    depart(stream_id, registry).await;
    reason
}

async fn handle_message<W>(stream_id: StreamId, message: Message, registry: &Registry<W>)
where
    W: AsyncWrite + Unpin + Send,
{
    let text = message.text().into_owned();

    if let Some((username, body)) = chat::split(&text) {
        registry.update_identity(stream_id, username).await;
        tracing::info!(stream_id, %username, kind = %message.kind, "received: {body}");

        if body == chat::LIST_COMMAND {
            reply_active_users(stream_id, registry).await;
            return;
        }
    } else {
        tracing::info!(stream_id, kind = %message.kind, "received: {text}");
    }

    if let Err(e) = registry.broadcast(&message).await {
        tracing::warn!(stream_id, error = %e, "failed to relay message");
    }
}

async fn reply_active_users<W>(stream_id: StreamId, registry: &Registry<W>)
where
    W: AsyncWrite + Unpin + Send,
{
    let users = registry.list_active_users().await;
    let reply = Message::content(chat::active_users_reply(&users));

    if let Err(e) = registry.send_to(stream_id, &reply).await {
        tracing::warn!(stream_id, error = %e, "failed to send active user list");
    }
}

async fn depart<W>(stream_id: StreamId, registry: &Registry<W>)
where
    W: AsyncWrite + Unpin + Send,
{
    let username = match registry.unregister(stream_id).await {
        Some(participant) => {
            if let Err(e) = participant.close().await {
                tracing::debug!(stream_id, error = %e, "stream already closed");
            }
            participant.username
        },
        None => String::new(),
    };

    let notice = chat::leave_notice(&username);
    tracing::info!(stream_id, "{notice}");

    if let Err(e) = registry.broadcast(&Message::leave(notice)).await {
        tracing::warn!(stream_id, error = %e, "failed to broadcast leave notice");
    }
}
