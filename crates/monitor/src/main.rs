//! Drowsiness Monitor - Main Entry Point
//!
//! Usage: `drowsiness-monitor [config.toml]`

use std::path::PathBuf;

use anyhow::Context;
use monitor::{init_logging, run, MonitorConfig};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = MonitorConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.log);

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Commands: r = reset blinks, s = screenshot, q = quit");

    run(config).await?;

    Ok(())
}
