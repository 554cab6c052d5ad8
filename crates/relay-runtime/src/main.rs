//! # Attestation Relay
//!
//! Entry point for the relay node.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration from the environment, failing fast on gaps
//! 3. Derive the publisher identity and wire the relay service
//! 4. Connect the Postgres listener, start handler loops and the stdin feed
//! 5. Run until Ctrl+C, then let in-flight work finish within a grace period

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use relay_runtime::{RelayConfig, RelayRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = RelayConfig::from_env().context("Failed to load relay configuration")?;

    // Create and start the relay runtime
    let runtime = RelayRuntime::new(config)?;
    runtime.start().await?;

    info!("Relay is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    // Graceful shutdown
    runtime.shutdown().await;

    Ok(())
}
