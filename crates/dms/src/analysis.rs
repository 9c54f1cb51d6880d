//! Per-frame DMS events

use serde::{Deserialize, Serialize};

/// Outcome of feeding one frame to the drowsiness state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DmsEvent {
    /// No face in this frame
    NoFace,

    /// Eyes below threshold, carrying the consecutive closed-frame count
    EyesClosed(u32),

    /// Closure lasted long enough to engage the alarm (carries the EAR)
    AlarmRaised(f32),

    /// Alarm disengaged (eyes reopened or face lost)
    AlarmCleared,

    /// A closure episode ended within the blink window
    BlinkDetected,

    /// Eyes open, nothing else to report
    EyesOpen,
}

impl DmsEvent {
    /// Whether this event flips the alarm flag
    pub fn is_alarm_edge(&self) -> bool {
        matches!(self, DmsEvent::AlarmRaised(_) | DmsEvent::AlarmCleared)
    }
}
