//! Session statistics and telemetry

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Frames between FPS recomputations
const FPS_WINDOW_FRAMES: u32 = 30;

/// Counters for the lifetime of the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Blinks counted since start or the last manual reset
    pub total_blinks: u64,
    /// Frames processed since start
    pub frames_processed: u64,
}

/// Last known alcohol sensor reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub alcohol_level: i32,
}

impl TelemetryReading {
    /// Replace the reading when a value was parsed, keep it otherwise
    pub fn update(&mut self, parsed: Option<i32>) -> bool {
        match parsed {
            Some(level) => {
                self.alcohol_level = level;
                true
            }
            None => false,
        }
    }

    pub fn exceeds(&self, limit: i32) -> bool {
        self.alcohol_level >= limit
    }
}

/// Frames-per-second estimate, refreshed every 30 frames
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame finished at `now`
    pub fn tick(&mut self, now: Instant) {
        self.frames += 1;
        if self.frames < FPS_WINDOW_FRAMES {
            return;
        }
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed > Duration::ZERO {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
        }
        self.window_start = now;
        self.frames = 0;
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// A pending request for the renderer to save the current frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    /// Suggested file name, `screenshot_<unix seconds>.jpg`
    pub file_name: String,
    /// Frame counter when the request was made
    pub frame: u64,
}

impl ScreenshotRequest {
    pub fn new(frame: u64) -> Self {
        Self {
            file_name: format!("screenshot_{}.jpg", chrono::Utc::now().timestamp()),
            frame,
        }
    }
}
