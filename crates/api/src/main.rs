//! Driver Telemetry Dashboard - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, DashboardConfig};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = DashboardConfig::load(config_path.as_deref())
        .context("Failed to load dashboard configuration")?;
    init_logging(&config.logging)?;

    info!("=== Driver Telemetry Dashboard v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Sampling every {} ms, alert threshold {}, {} emergency contacts",
        config.session.sample_period_ms,
        config.session.alert.score_threshold,
        config.contacts.len()
    );

    run_server(config).await
}
