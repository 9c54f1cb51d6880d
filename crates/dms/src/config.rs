//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Drowsiness detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// EAR below this value counts as a closed-eye frame
    pub ear_threshold: f32,

    /// Consecutive closed frames that raise the alarm (~2s at 24fps)
    pub consec_frames: u32,

    /// A closure must last more than this many frames to count as a blink
    pub blink_min_frames: u32,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.20,
            consec_frames: 48,
            blink_min_frames: 5,
        }
    }
}

impl DmsConfig {
    /// Check that the thresholds describe a usable state machine
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(self.ear_threshold > 0.0 && self.ear_threshold.is_finite()) {
            return Err(DmsError::Config(format!(
                "ear_threshold must be a positive number, got {}",
                self.ear_threshold
            )));
        }
        if self.consec_frames == 0 {
            return Err(DmsError::Config("consec_frames must be at least 1".into()));
        }
        if self.blink_min_frames >= self.consec_frames {
            return Err(DmsError::Config(format!(
                "blink_min_frames ({}) must be below consec_frames ({})",
                self.blink_min_frames, self.consec_frames
            )));
        }
        Ok(())
    }
}
