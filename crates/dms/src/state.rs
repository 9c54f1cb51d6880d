//! Eye closure state tracking

use serde::{Deserialize, Serialize};

/// Closure counters owned by [`crate::DrowsinessMonitor`].
///
/// Mutated once per processed frame; copies handed out are snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureState {
    /// Consecutive frames with EAR below threshold
    pub consecutive_closed_frames: u32,

    /// Whether the drowsiness alarm is engaged
    pub alarm_active: bool,

    /// Set once the current closure episode has been counted as a blink
    pub blink_armed: bool,
}

impl ClosureState {
    /// Drop back to the "no closure in progress" baseline, keeping the alarm flag
    pub fn clear_closure(&mut self) {
        self.consecutive_closed_frames = 0;
        self.blink_armed = false;
    }

    /// Reset everything (on driver change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
