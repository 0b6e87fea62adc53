//! QUIC transport for the client.
//!
//! Provides [`ChatConnection`], a dialed connection plus the endpoint that
//! owns it, and [`client_tls_config`] for building the TLS side. Protocol
//! logic stays in [`crate::ChatClient`].

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use quicchat_proto::ALPN_PROTOCOL;
use quinn::{ClientConfig, Endpoint, IdleTimeout, RecvStream, SendStream, TransportConfig};

use crate::error::ClientError;

/// Idle connections are closed after this long without traffic.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Keep-alive interval, so a quiet participant is not timed out.
const KEEP_ALIVE: Duration = Duration::from_secs(10);

/// A QUIC connection to a chat server.
pub struct ChatConnection {
    endpoint: Endpoint,
    connection: quinn::Connection,
}

impl ChatConnection {
    /// Resolve `address` (`host:port`) and complete the QUIC handshake.
    ///
    /// The host part is sent as the TLS server name.
    pub async fn dial(address: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let remote = tokio::net::lookup_host(address)
            .await
            .map_err(|e| ClientError::Config(format!("invalid server address '{address}': {e}")))?
            .next()
            .ok_or_else(|| {
                ClientError::Config(format!("server address '{address}' did not resolve"))
            })?;

        let local = if remote.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };

        let mut endpoint = Endpoint::client(local)
            .map_err(|e| ClientError::Connection(format!("endpoint creation failed: {e}")))?;
        endpoint.set_default_client_config(config);

        let connection = endpoint
            .connect(remote, server_name(address))
            .map_err(|e| ClientError::Connection(format!("connect failed: {e}")))?
            .await
            .map_err(|e| ClientError::Connection(format!("connection failed: {e}")))?;

        tracing::info!(%remote, "connected to server");

        Ok(Self { endpoint, connection })
    }

    /// Open a new bidirectional stream.
    pub async fn open_stream(&self) -> Result<(SendStream, RecvStream), ClientError> {
        self.connection
            .open_bi()
            .await
            .map_err(|e| ClientError::Stream(format!("open stream failed: {e}")))
    }

    /// Address of the server.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Local socket the connection was dialed from.
    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ClientError::Connection(format!("failed to get local address: {e}")))
    }

    /// Close the connection and wait for the close to reach the wire.
    pub async fn close(&self) {
        self.connection.close(0u32.into(), b"client leaving");
        self.endpoint.wait_idle().await;
    }
}

/// Host part of `host:port`, without IPv6 brackets.
fn server_name(address: &str) -> &str {
    let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}

/// Build the client's QUIC configuration.
///
/// With `cert_path` the server must present exactly the certificate(s) in
/// that PEM file. Without it any certificate is accepted.
pub fn client_tls_config(cert_path: Option<&str>) -> Result<ClientConfig, ClientError> {
    let mut crypto = match cert_path {
        Some(path) => trusted_cert_config(path)?,
        None => {
            tracing::warn!("No certificate given - server certificate will NOT be verified");
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
                .with_no_client_auth()
        },
    };

    // Must match server's ALPN protocol
    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let quic = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| ClientError::Config(format!("QUIC config error: {e}")))?;
    let mut config = ClientConfig::new(Arc::new(quic));

    let idle = IdleTimeout::try_from(IDLE_TIMEOUT)
        .map_err(|e| ClientError::Config(format!("invalid idle timeout: {e}")))?;
    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(Some(idle));
    transport.keep_alive_interval(Some(KEEP_ALIVE));
    config.transport_config(Arc::new(transport));

    Ok(config)
}

fn trusted_cert_config(cert_path: &str) -> Result<rustls::ClientConfig, ClientError> {
    let pem = std::fs::read(cert_path)
        .map_err(|e| ClientError::Config(format!("failed to read cert '{cert_path}': {e}")))?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut &pem[..]) {
        let cert = cert
            .map_err(|e| ClientError::Config(format!("failed to parse certificates: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| ClientError::Config(format!("unusable certificate: {e}")))?;
    }

    if roots.is_empty() {
        return Err(ClientError::Config(format!("no certificates found in '{cert_path}'")));
    }

    Ok(rustls::ClientConfig::builder().with_root_certificates(roots).with_no_client_auth())
}

/// Certificate verifier that accepts any certificate (insecure, for
/// development).
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
