//! Stream registry and broadcaster.
//!
//! One entry per open stream, keyed by [`StreamId`]. Each entry carries the
//! participant's last-known username, the remote address of the connection it
//! belongs to, and the write half of the stream.
//!
//! There is exactly one map. The per-connection view ("who is on this
//! address?") is computed from it on demand, so it cannot drift from the
//! per-stream state when a connection opens several streams.
//!
//! # Locking
//!
//! The map lives behind a single `RwLock`. Broadcast takes a snapshot of the
//! writers under the read lock, releases it, and only then writes. A stalled
//! peer therefore delays the broadcast that is writing to it, but never blocks
//! registration, identity updates or cleanup on other streams. Each writer has
//! its own mutex so two frames never interleave on one stream.

use std::{
    collections::BTreeMap,
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use quicchat_proto::Message;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, RwLock},
};

use crate::error::ServerError;

/// Identity of one registered stream. Never reused within a process.
pub type StreamId = u64;

/// A registered stream and the participant speaking on it.
pub struct Participant<W> {
    /// Last username seen on this stream. Empty until the first chat line.
    pub username: String,
    /// Remote address of the owning connection
    pub remote_addr: SocketAddr,
    writer: Arc<Mutex<W>>,
}

impl<W: AsyncWrite + Unpin + Send> Participant<W> {
    /// Shut down the write half of the stream.
    pub async fn close(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Streams the frame was written to
    pub delivered: usize,
    /// Streams whose write failed
    pub failed: usize,
}

/// Registry of open streams, shared by every connection and stream task.
pub struct Registry<W> {
    participants: RwLock<BTreeMap<StreamId, Participant<W>>>,
    next_id: AtomicU64,
}

impl<W> Default for Registry<W> {
    fn default() -> Self {
        Self { participants: RwLock::new(BTreeMap::new()), next_id: AtomicU64::new(1) }
    }
}

impl<W: AsyncWrite + Unpin + Send> Registry<W> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream with an empty username.
    pub async fn register(&self, writer: W, remote_addr: SocketAddr) -> StreamId {
        let stream_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let participant =
            Participant { username: String::new(), remote_addr, writer: Arc::new(Mutex::new(writer)) };

        self.participants.write().await.insert(stream_id, participant);
        tracing::debug!(stream_id, %remote_addr, "stream registered");

        stream_id
    }

    /// Set the username for a stream, overwriting whatever was there.
    ///
    /// Returns `false` if the stream is not registered.
    pub async fn update_identity(&self, stream_id: StreamId, username: &str) -> bool {
        let mut participants = self.participants.write().await;
        let Some(participant) = participants.get_mut(&stream_id) else {
            return false;
        };

        if participant.username != username {
            tracing::debug!(stream_id, old = %participant.username, new = %username, "identity updated");
            participant.username = username.to_string();
        }
        true
    }

    /// Remove a stream and hand back its entry.
    ///
    /// The returned username is the departure name; it is empty if the stream
    /// never sent a chat line.
    pub async fn unregister(&self, stream_id: StreamId) -> Option<Participant<W>> {
        let participant = self.participants.write().await.remove(&stream_id)?;
        tracing::debug!(stream_id, username = %participant.username, "stream unregistered");
        Some(participant)
    }

    /// Current username of a stream. `None` if the stream is not registered.
    pub async fn username(&self, stream_id: StreamId) -> Option<String> {
        self.participants.read().await.get(&stream_id).map(|p| p.username.clone())
    }

    /// Check if a stream is registered.
    pub async fn contains(&self, stream_id: StreamId) -> bool {
        self.participants.read().await.contains_key(&stream_id)
    }

    /// Number of registered streams.
    pub async fn len(&self) -> usize {
        self.participants.read().await.len()
    }

    /// Whether no stream is registered.
    pub async fn is_empty(&self) -> bool {
        self.participants.read().await.is_empty()
    }

    /// Non-empty usernames, in registration order.
    pub async fn list_active_users(&self) -> Vec<String> {
        self.participants
            .read()
            .await
            .values()
            .filter(|p| !p.username.is_empty())
            .map(|p| p.username.clone())
            .collect()
    }

    /// Non-empty usernames of every stream opened by one connection.
    pub async fn users_at(&self, remote_addr: SocketAddr) -> Vec<String> {
        self.participants
            .read()
            .await
            .values()
            .filter(|p| p.remote_addr == remote_addr && !p.username.is_empty())
            .map(|p| p.username.clone())
            .collect()
    }

    /// Write one message to a single stream.
    pub async fn send_to(&self, stream_id: StreamId, message: &Message) -> Result<(), ServerError> {
        let frame = message.encode_frame()?;

        let writer = self
            .participants
            .read()
            .await
            .get(&stream_id)
            .map(|p| Arc::clone(&p.writer))
            .ok_or(ServerError::StreamNotFound(stream_id))?;

        write_frame(&writer, &frame)
            .await
            .map_err(|e| ServerError::Transport(format!("write to stream {stream_id} failed: {e}")))
    }

    /// Write one message to every registered stream.
    ///
    /// The message is encoded once. A failed write is logged and counted and
    /// does not stop delivery to the remaining streams.
    ///
    /// # Errors
    ///
    /// - `ServerError::Codec` if the message does not fit in one frame. Nothing
    ///   is written in that case.
    pub async fn broadcast(&self, message: &Message) -> Result<BroadcastReport, ServerError> {
        let frame = message.encode_frame()?;

        let recipients: Vec<(StreamId, Arc<Mutex<W>>)> = self
            .participants
            .read()
            .await
            .iter()
            .map(|(id, p)| (*id, Arc::clone(&p.writer)))
            .collect();

        let mut report = BroadcastReport::default();
        for (stream_id, writer) in recipients {
            match write_frame(&writer, &frame).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(stream_id, error = %e, "broadcast write failed");
                    report.failed += 1;
                },
            }
        }

        tracing::debug!(
            kind = %message.kind,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast complete"
        );

        Ok(report)
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &Mutex<W>, frame: &[u8]) -> io::Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(frame).await?;
    writer.flush().await
}
