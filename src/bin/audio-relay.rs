//! Audio relay server
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:8080
//! audio-relay
//!
//! # Custom port
//! audio-relay --port 9000
//! RELAY_PORT=9000 audio-relay
//!
//! # Bind a specific address
//! audio-relay --bind 127.0.0.1:8080
//!
//! # Enable debug logging
//! RUST_LOG=audio_relay=debug audio-relay
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting, close open connections, exit

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use audio_relay::protocol::constants::DEFAULT_PORT;
use audio_relay::{RelayServer, ServerConfig};

/// WebSocket relay forwarding device audio to listening connections
#[derive(Parser, Debug)]
#[command(name = "audio-relay", version, about)]
struct Args {
    /// IP address to listen on
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "RELAY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Full listen address; overrides --host and --port
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<SocketAddr>,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("audio_relay=info".parse()?),
        )
        .init();

    let bind_addr = args
        .bind
        .unwrap_or_else(|| SocketAddr::new(args.host, args.port));
    let config = ServerConfig::with_addr(bind_addr).max_connections(args.max_connections);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %bind_addr,
        "Audio relay starting"
    );

    let server = RelayServer::new(config);
    server
        .run_until(async {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!(error = %e, "Error waiting for shutdown signal");
            }
        })
        .await
        .with_context(|| format!("Relay failed on {}", bind_addr))?;

    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
