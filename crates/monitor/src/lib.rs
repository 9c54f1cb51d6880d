//! Drowsiness Monitor
//!
//! Session layer tying the DMS state machine to the alert device: per-frame
//! coordination, statistics, configuration, logging and the replay-driven
//! run loop used by the `drowsiness-monitor` binary.

pub mod config;
pub mod coordinator;
pub mod logging;
pub mod replay;
pub mod stats;

pub use config::{LogConfig, MonitorConfig, ReplayConfig};
pub use coordinator::{SessionCoordinator, SessionSnapshot};
pub use logging::init_logging;
pub use replay::ReplaySource;
pub use stats::{FpsMeter, ScreenshotRequest, SessionStats, TelemetryReading};

use std::time::Duration;

use alert_link::SerialLink;
use anyhow::{ensure, Context};
use dms::{DrowsinessMonitor, LandmarkSource};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Commands from the operator console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    ResetBlinks,
    Screenshot,
    Quit,
}

impl OperatorCommand {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "r" | "reset" => Some(OperatorCommand::ResetBlinks),
            "s" | "screenshot" => Some(OperatorCommand::Screenshot),
            "q" | "quit" => Some(OperatorCommand::Quit),
            _ => None,
        }
    }
}

/// Install the Prometheus exporter if an address is configured
pub fn init_metrics(config: &MonitorConfig) -> anyhow::Result<()> {
    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }
    Ok(())
}

/// Run a monitoring session driven by stdin commands
pub async fn run(config: MonitorConfig) -> anyhow::Result<SessionStats> {
    run_session(config, BufReader::new(tokio::io::stdin())).await
}

/// Run until the recording ends, `q` arrives on `console`, or Ctrl+C
pub async fn run_session<C>(config: MonitorConfig, console: C) -> anyhow::Result<SessionStats>
where
    C: AsyncBufRead + Unpin,
{
    ensure!(
        config.replay.fps > 0.0 && config.replay.fps.is_finite(),
        "replay.fps must be positive, got {}",
        config.replay.fps
    );
    let monitor = DrowsinessMonitor::new(config.dms.clone())?;
    let path = config
        .replay
        .path
        .clone()
        .context("No landmark source configured (set replay.path)")?;
    let mut source = ReplaySource::open(&path)?;

    init_metrics(&config)?;

    info!(
        ear_threshold = config.dms.ear_threshold,
        consec_frames = config.dms.consec_frames,
        alcohol_limit = config.alcohol_limit,
        camera_index = config.camera_index,
        "Starting drowsiness monitor"
    );

    let link = SerialLink::connect(config.link.clone()).await;
    let mut coordinator = SessionCoordinator::new(monitor, link, config.alcohol_limit);

    let mut ticker = tokio::time::interval(Duration::from_secs_f32(1.0 / config.replay.fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut console = console.lines();
    let mut console_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, exiting");
                break;
            }
            line = console.next_line(), if console_open => match line {
                Ok(Some(input)) => match OperatorCommand::parse(&input) {
                    Some(OperatorCommand::Quit) => break,
                    Some(OperatorCommand::ResetBlinks) => coordinator.reset_blink_counter(),
                    Some(OperatorCommand::Screenshot) => coordinator.request_screenshot(),
                    None if input.trim().is_empty() => {}
                    None => warn!("Unknown command {:?} (r = reset blinks, s = screenshot, q = quit)", input.trim()),
                },
                Ok(None) | Err(_) => console_open = false,
            },
            _ = ticker.tick() => {
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        coordinator.process_landmarks(&frame).await;
                    }
                    Ok(None) => {
                        info!("Landmark recording finished");
                        break;
                    }
                    Err(e) => {
                        error!("Landmark source failed: {}", e);
                        break;
                    }
                }
                if let Some(request) = coordinator.take_screenshot_request() {
                    info!(frame = request.frame, "No renderer attached, skipping {}", request.file_name);
                }
            }
        }
    }

    Ok(coordinator.shutdown().await)
}
