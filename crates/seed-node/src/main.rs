//! Tenderseed: a seed node for Tendermint-style gossip networks.
//!
//! Reads `$SEED_HOME/config/config.toml` (default `~/.tenderseed`),
//! writing it with defaults on first start, and runs until Ctrl-C or
//! SIGTERM.

use anyhow::{Context, Result};
use tracing::info;

use seed_node::{home_dir, init_telemetry, shutdown_signal, SeedConfig, SeedRuntime, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("failed to initialize logging")?;

    let home = home_dir(|name| std::env::var(name).ok())?;
    let mut config = SeedConfig::load_or_init(&home)?;
    config.apply_env()?;

    let runtime = SeedRuntime::bootstrap(config, &home).await?;
    info!("Seed is running. Press Ctrl+C to stop.");
    runtime.run_until(shutdown_signal()).await;

    info!("Shutdown complete");
    Ok(())
}
