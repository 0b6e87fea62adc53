//! Shared helpers for server integration tests.

#![allow(dead_code)]

use std::{collections::VecDeque, time::Duration};

use quicchat_proto::{FrameSplitter, MAX_FRAME_SIZE, Message};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::timeout,
};

/// How long a test waits for a frame that should arrive.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a test waits to be sure a frame does not arrive.
pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Reads frames from a stream, splitting reads that carry several frames.
///
/// The server never splits coalesced frames; tests do, so they can observe
/// every frame the server wrote regardless of how the bytes arrived.
pub struct FrameReader<R> {
    reader: R,
    splitter: FrameSplitter,
    ready: VecDeque<Message>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, splitter: FrameSplitter::new(), ready: VecDeque::new() }
    }

    /// Next frame, or `None` at end of stream / read error.
    pub async fn next(&mut self) -> Option<Message> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Some(message);
            }

            let mut buf = [0u8; MAX_FRAME_SIZE];
            let n = self.reader.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            let frames = self.splitter.push(&buf[..n]).expect("server wrote a malformed frame");
            self.ready.extend(frames);
        }
    }

    /// Next frame, failing the test if none arrives in time.
    pub async fn expect(&mut self) -> Message {
        match timeout(RECV_TIMEOUT, self.next()).await {
            Ok(Some(message)) => message,
            Ok(None) => panic!("stream ended while waiting for a frame"),
            Err(_) => panic!("timed out waiting for a frame"),
        }
    }

    /// Assert that nothing arrives for [`QUIET_PERIOD`].
    pub async fn expect_silence(&mut self) {
        if let Ok(Some(message)) = timeout(QUIET_PERIOD, self.next()).await {
            panic!("unexpected frame: {message}");
        }
    }
}
