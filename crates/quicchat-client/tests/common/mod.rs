//! Shared helpers for client integration tests: a loopback server and a raw
//! participant that speaks frames directly.

#![allow(dead_code)]

use std::{collections::VecDeque, net::SocketAddr, sync::Arc, time::Duration};

use quicchat_client::{ChatConnection, client_tls_config};
use quicchat_proto::{FrameSplitter, MAX_FRAME_SIZE, Message, chat};
use quicchat_server::{Registry, Server, ServerError, ServerRuntimeConfig};
use quinn::{RecvStream, SendStream};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    sync::oneshot,
    task::JoinHandle,
    time::timeout,
};

/// How long a test waits for something that should happen.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a test waits to be sure a frame does not arrive.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// A server running on a loopback port until [`TestServer::shutdown`].
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry<SendStream>>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Start a server with a generated self-signed certificate.
    pub fn start() -> Self {
        Self::start_with(None, None)
    }

    /// Start a server with the given PEM certificate and key.
    pub fn start_with(cert_path: Option<String>, key_path: Option<String>) -> Self {
        let config =
            ServerRuntimeConfig { address: "127.0.0.1".to_string(), port: 0, cert_path, key_path };
        let server = Server::bind(config).expect("server binds");
        let addr = server.local_addr().expect("bound address");
        let registry = server.registry();

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));

        Self { addr, registry, stop, handle }
    }

    /// Port the server listens on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait until the registry holds exactly `expected` streams.
    pub async fn wait_for_streams(&self, expected: usize) {
        let registry = Arc::clone(&self.registry);
        let settled = timeout(RECV_TIMEOUT, async move {
            while registry.len().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(settled.is_ok(), "registry never reached {expected} streams");
    }

    /// Stop the server and wait for it to finish.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        let _ = self.stop.send(());
        timeout(RECV_TIMEOUT, self.handle)
            .await
            .expect("server stops in time")
            .expect("server task did not panic")
    }
}

/// Reads frames from a stream, splitting reads that carry several frames.
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

    /// Every frame that arrives until the stream goes quiet.
    pub async fn drain(&mut self) -> Vec<Message> {
        let mut frames = Vec::new();
        while let Ok(Some(message)) = timeout(QUIET_PERIOD, self.next()).await {
            frames.push(message);
        }
        frames
    }
}

/// A participant driven frame by frame over its own QUIC connection.
pub struct RawPeer {
    pub connection: ChatConnection,
    pub send: SendStream,
    pub frames: FrameReader<RecvStream>,
}

impl RawPeer {
    /// Dial, open a stream and announce `username`. Consumes the welcome.
    pub async fn join(server: &TestServer, username: &str) -> Self {
        let address = format!("127.0.0.1:{}", server.port());
        let config = client_tls_config(None).expect("tls config");
        let connection = ChatConnection::dial(&address, config).await.expect("dial");
        let (send, recv) = connection.open_stream().await.expect("open stream");

        let mut peer = Self { connection, send, frames: FrameReader::new(recv) };
        peer.send(&Message::join(chat::join_notice(username))).await;

        let welcome = peer.frames.expect().await;
        assert_eq!(welcome.text(), chat::WELCOME);

        peer
    }

    pub async fn send(&mut self, message: &Message) {
        let frame = message.encode_frame().expect("frame fits");
        AsyncWriteExt::write_all(&mut self.send, &frame).await.expect("write frame");
    }

    /// Send a chat line as `username`.
    pub async fn say(&mut self, username: &str, text: &str) {
        self.send(&Message::content(chat::compose(username, text))).await;
    }
}
