//! WebSocket Broadcast Relay - Entry Point
//!
//! Parses the command line, starts the Registry and listener, and accepts
//! connections until Ctrl-C.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use broadcast_relay::{tls, Args, RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=broadcast_relay=trace
    let default_filter = if args.verbose {
        "broadcast_relay=debug"
    } else {
        "broadcast_relay=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // Any configuration or startup error ends the process here
    let config = RelayConfig::try_from(args)?;
    if config.tls.is_some() {
        tls::install_crypto_provider();
    }

    let server = RelayServer::bind(&config).await?;
    info!("Relay configured: {}", config.bind_addr());

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
