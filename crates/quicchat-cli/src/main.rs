//! quicchat binary.
//!
//! # Usage
//!
//! ```bash
//! # Relay server with a self-signed certificate (development)
//! quicchat --server --address 0.0.0.0 --port 4242
//!
//! # Relay server with a TLS certificate
//! quicchat --server --cert cert.pem --key key.pem
//!
//! # Client
//! quicchat --client --address chat.example.org --username alice --cert cert.pem
//! ```
//!
//! Logs go to stderr so they do not interleave with chat lines on stdout.

use std::time::Duration;

use clap::{ArgGroup, Parser};
use quicchat_client::{ChatClient, ClientConfig};
use quicchat_server::{Server, ServerRuntimeConfig};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Multi-user chat over QUIC
#[derive(Parser, Debug)]
#[command(name = "quicchat")]
#[command(about = "Multi-user chat relay over QUIC")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["server", "client"])))]
struct Args {
    /// Run the relay server
    #[arg(long)]
    server: bool,

    /// Run an interactive chat client
    #[arg(long)]
    client: bool,

    /// TLS certificate (PEM). Server: certificate to present. Client:
    /// the only certificate to trust.
    #[arg(long)]
    cert: Option<String>,

    /// TLS private key (PEM), server only
    #[arg(long)]
    key: Option<String>,

    /// Address to listen on (server) or dial (client)
    #[arg(long, default_value = "localhost")]
    address: String,

    /// UDP port
    #[arg(long, default_value_t = 4242)]
    port: u16,

    /// Name shown to other participants
    #[arg(long, default_value = "defaultuser")]
    username: String,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(args));

    // A pending stdin read holds a blocking thread that never returns
    runtime.shutdown_timeout(Duration::from_millis(100));

    result
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.server {
        run_server(args).await
    } else {
        run_client(args).await
    }
}

async fn run_server(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("quicchat server starting");

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let config = ServerRuntimeConfig {
        address: args.address,
        port: args.port,
        cert_path: args.cert,
        key_path: args.key,
    };

    let server = Server::bind(config)?;
    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run_until(interrupted()).await?;

    Ok(())
}

async fn run_client(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig {
        server_address: args.address,
        port: args.port,
        cert_path: args.cert,
        username: args.username,
    };

    tracing::info!(server = %config.server_addr(), username = %config.username, "connecting");

    let client = ChatClient::connect(&config).await?;
    client.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), interrupted()).await?;

    Ok(())
}

/// Completes on ctrl-c. Never completes if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
