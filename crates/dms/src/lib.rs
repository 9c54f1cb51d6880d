//! Driver Monitoring System (DMS)
//!
//! Turns a per-frame eye-openness signal into stable driver state events:
//! - Eye Aspect Ratio (EAR) from facial landmarks
//! - Blink counting with a debounce window
//! - Drowsiness alarm on sustained eye closure, edge-triggered

pub mod analysis;
pub mod config;
pub mod geometry;
pub mod landmarks;
pub mod state;

pub use analysis::DmsEvent;
pub use config::DmsConfig;
pub use geometry::{average_ear, distance, eye_aspect_ratio, EyeContour, Point, OPEN_EYE_FALLBACK};
pub use landmarks::{EyePair, FaceLandmarks, LandmarkFrame, LandmarkSource, LEFT_EYE, RIGHT_EYE};
pub use state::ClosureState;

use thiserror::Error;
use tracing::{debug, info, warn};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Landmark {index} missing (provider returned {available} points)")]
    KeypointsMissing { index: usize, available: usize },

    #[error("Landmark source failed: {0}")]
    Source(String),
}

/// EAR-driven drowsiness state machine.
///
/// Consumes one sample per frame and reports at most one [`DmsEvent`].
pub struct DrowsinessMonitor {
    config: DmsConfig,
    state: ClosureState,
}

impl DrowsinessMonitor {
    /// Create a monitor with validated thresholds
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        Ok(Self {
            config,
            state: ClosureState::default(),
        })
    }

    /// Feed one frame. `ear` is `None` when no face was detected.
    pub fn update(&mut self, ear: Option<f32>) -> DmsEvent {
        let Some(ear) = ear else {
            self.state.clear_closure();
            return if self.clear_alarm() {
                DmsEvent::AlarmCleared
            } else {
                DmsEvent::NoFace
            };
        };

        let ear = if ear.is_finite() { ear } else { OPEN_EYE_FALLBACK };

        if ear < self.config.ear_threshold {
            self.on_closed_frame(ear)
        } else {
            self.on_open_frame()
        }
    }

    fn on_closed_frame(&mut self, ear: f32) -> DmsEvent {
        if self.state.consecutive_closed_frames == 0 {
            // New closure episode: it may be counted as a blink once
            self.state.blink_armed = false;
        }
        self.state.consecutive_closed_frames = self.state.consecutive_closed_frames.saturating_add(1);
        let count = self.state.consecutive_closed_frames;

        if count >= self.config.consec_frames && !self.state.alarm_active {
            self.state.alarm_active = true;
            warn!(ear, closed_frames = count, "Drowsiness detected, raising alarm");
            return DmsEvent::AlarmRaised(ear);
        }

        DmsEvent::EyesClosed(count)
    }

    fn on_open_frame(&mut self) -> DmsEvent {
        let run = self.state.consecutive_closed_frames;
        let mut event = DmsEvent::EyesOpen;

        if run > self.config.blink_min_frames
            && run < self.config.consec_frames
            && !self.state.blink_armed
        {
            self.state.blink_armed = true;
            debug!(closed_frames = run, "Blink detected");
            event = DmsEvent::BlinkDetected;
        }

        self.state.consecutive_closed_frames = 0;

        if self.clear_alarm() {
            event = DmsEvent::AlarmCleared;
        }
        event
    }

    fn clear_alarm(&mut self) -> bool {
        if self.state.alarm_active {
            self.state.alarm_active = false;
            info!("Alarm cleared");
            true
        } else {
            false
        }
    }

    /// Snapshot of the closure counters
    pub fn state(&self) -> ClosureState {
        self.state
    }

    /// Whether the alarm is currently engaged
    pub fn alarm_active(&self) -> bool {
        self.state.alarm_active
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Reset closure state (on driver change)
    pub fn reset_state(&mut self) {
        self.state.reset();
    }
}

impl Default for DrowsinessMonitor {
    fn default() -> Self {
        Self {
            config: DmsConfig::default(),
            state: ClosureState::default(),
        }
    }
}
