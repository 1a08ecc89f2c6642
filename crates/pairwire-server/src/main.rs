//! Pairwire server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on all interfaces, port 3000
//! pairwire-server --bind 0.0.0.0:3000
//!
//! # Verbose logging, smaller message limit
//! pairwire-server --log-level debug --max-message-bytes 16384
//! ```

use std::time::Duration;

use clap::Parser;
use pairwire_server::{DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Pairwire matchmaking and signaling server
#[derive(Parser, Debug)]
#[command(name = "pairwire-server")]
#[command(about = "One-to-one matchmaking and signaling relay for video chat")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Largest accepted WebSocket message in bytes
    #[arg(long, default_value = "65536")]
    max_message_bytes: usize,

    /// Seconds between housekeeping ticks
    #[arg(long, default_value = "30")]
    tick_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Pairwire server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        max_message_bytes: args.max_message_bytes,
        tick_interval: Duration::from_secs(args.tick_secs.max(1)),
        driver: DriverConfig { max_connections: args.max_connections },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on ws://{}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}
