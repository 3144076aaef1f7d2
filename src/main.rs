//! evotrade server - headless evolutionary trading simulation
//!
//! Runs the execution scheduler and the population manager until Ctrl+C.
//! Metrics are pushed via structured JSON logs to stdout.
//!
//! # Usage
//! ```sh
//! POLL_INTERVAL_MS=2000 EVOLUTION_INTERVAL_HOURS=0.1 cargo run
//! ```
//!
//! # Environment Variables
//! - `DATABASE_URL` - SQLite URL (default: in-memory store)
//! - `OBSERVABILITY_ENABLED` - Enable metrics reporting (default: true)
//! - `OBSERVABILITY_INTERVAL` - Seconds between metric outputs (default: 60)
//! - `RNG_SEED` - Seed for reproducible runs

use anyhow::Result;
use evotrade::application::system::Application;
use evotrade::config::Config;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("evotrade {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: population={}, batch size={}, poll={:?}, evolution every {:?}",
        config.evolution.initial_population,
        config.scheduler.batch_size,
        config.scheduler.poll_interval,
        config.evolution.interval
    );

    let app = Application::build(config).await?;
    let handle = app.start().await?;

    info!("Server running. Press Ctrl+C to shutdown.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    handle.shutdown().await;
    Ok(())
}
