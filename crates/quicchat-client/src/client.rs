//! Chat session lifecycle.
//!
//! ```text
//! CONNECTING -> JOINED -> INTERACTIVE -> LEAVING -> TERMINATED
//! ```
//!
//! [`ChatClient::connect`] covers CONNECTING; [`ChatClient::run`] covers the
//! rest. The receive loop and the input loop are free functions over generic
//! readers and writers so they can run against in-memory pipes.

use std::future::Future;

use quicchat_proto::{CodecError, FrameSplitter, MAX_FRAME_SIZE, Message, chat};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::ClientError,
    transport::{ChatConnection, client_tls_config},
};

/// How long leaving waits for the LEAVE notice to be acknowledged.
const LEAVE_FLUSH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host or IP
    pub server_address: String,
    /// Server UDP port
    pub port: u16,
    /// PEM certificate to trust; `None` accepts any server certificate
    pub cert_path: Option<String>,
    /// Name shown to other participants
    pub username: String,
}

impl ClientConfig {
    /// `host:port` string, with IPv6 literals bracketed.
    pub fn server_addr(&self) -> String {
        if self.server_address.contains(':') && !self.server_address.starts_with('[') {
            format!("[{}]:{}", self.server_address, self.port)
        } else {
            format!("{}:{}", self.server_address, self.port)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "localhost".to_string(),
            port: 4242,
            cert_path: None,
            username: "defaultuser".to_string(),
        }
    }
}

/// A connected chat participant.
pub struct ChatClient {
    username: String,
    connection: ChatConnection,
}

impl ChatClient {
    /// Dial the server. Failure is final; there is no retry.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let tls = client_tls_config(config.cert_path.as_deref())?;
        let connection = ChatConnection::dial(&config.server_addr(), tls).await?;

        Ok(Self { username: config.username.clone(), connection })
    }

    /// Username this client chats as.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The underlying connection.
    pub fn connection(&self) -> &ChatConnection {
        &self.connection
    }

    /// Join, relay lines from `input`, and leave.
    ///
    /// Every payload received on the primary stream is written to `display`
    /// as one line. The session ends when `input` is exhausted or `shutdown`
    /// completes; both paths send the LEAVE notice. A failed send ends the
    /// session with an error and skips the notice.
    pub async fn run<I, O, F>(self, input: I, display: O, shutdown: F) -> Result<(), ClientError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let (mut send, recv) = self.connection.open_stream().await?;

        send_message(&mut send, &Message::join(chat::join_notice(&self.username))).await?;
        tracing::info!(username = %self.username, "joined the chat");

        let receiver = tokio::spawn(receive_loop(recv, display));

        let outcome = tokio::select! {
            result = input_loop(&self.username, input, &mut send) => result,
            () = shutdown => {
                tracing::info!("interrupted");
                Ok(())
            }
        };

        match &outcome {
            Ok(()) => self.leave().await,
            Err(e) => {
                tracing::error!(error = %e, "session failed");
                self.connection.close().await;
            },
        }

        if let Err(e) = receiver.await {
            tracing::debug!(error = %e, "receive task ended abnormally");
        }

        outcome
    }

    /// Announce departure on a fresh stream, then close the connection.
    ///
    /// Best effort: failures are logged and the connection is closed anyway.
    pub async fn leave(&self) {
        let notice = Message::leave(chat::leave_notice(&self.username));

        match self.connection.open_stream().await {
            Ok((mut send, _recv)) => {
                if let Err(e) = send_message(&mut send, &notice).await {
                    tracing::warn!(error = %e, "failed to send leave notice");
                } else if let Err(e) = send.finish() {
                    tracing::warn!(error = %e, "failed to finish leave stream");
                } else if tokio::time::timeout(LEAVE_FLUSH_TIMEOUT, send.stopped()).await.is_err()
                {
                    tracing::debug!("leave notice not acknowledged in time");
                }
            },
            Err(e) => tracing::warn!(error = %e, "failed to open leave stream"),
        }

        self.connection.close().await;
        tracing::info!(username = %self.username, "left the chat");
    }
}

/// Write every received payload to `display`, one line each.
///
/// Returns silently when the stream ends, a read fails, the server sends
/// something undecodable, or `display` stops accepting writes.
pub async fn receive_loop<R, O>(mut reader: R, mut display: O)
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut splitter = FrameSplitter::new();
    let mut buf = [0u8; MAX_FRAME_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("server closed the stream");
                return;
            },
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "receive stopped");
                return;
            },
        };

        let frames = match splitter.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable data from server");
                return;
            },
        };

        for message in frames {
            tracing::trace!(kind = %message.kind, "received");

            let mut line = message.text().into_owned();
            line.push('\n');
            if display.write_all(line.as_bytes()).await.is_err() {
                return;
            }
        }

        if display.flush().await.is_err() {
            return;
        }
    }
}

/// Send each non-blank line of `input` as `"<username>: <line>"`.
///
/// Blank lines and lines too long for one frame are skipped with a warning.
/// Returns `Ok` at end of input; a write failure is returned as an error.
pub async fn input_loop<I, W>(username: &str, input: I, writer: &mut W) -> Result<(), ClientError>
where
    I: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            tracing::warn!("Empty message, not sent");
            continue;
        }

        match send_message(writer, &Message::content(chat::compose(username, line))).await {
            Ok(()) => tracing::debug!(len = line.len(), "sent"),
            Err(ClientError::Codec(CodecError::FrameTooLarge { size, max })) => {
                tracing::warn!(size, max, "Message too long, not sent");
            },
            Err(e) => return Err(e),
        }
    }

    tracing::debug!("input closed");
    Ok(())
}

async fn send_message<W>(writer: &mut W, message: &Message) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let frame = message.encode_frame()?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| ClientError::Stream(format!("write failed: {e}")))?;
    writer.flush().await.map_err(|e| ClientError::Stream(format!("flush failed: {e}")))
}
