//! Alert device wire protocol
//!
//! Newline-terminated ASCII lines inbound, single unframed bytes outbound.
//! No checksum, no acknowledgement: commands are delivered at most once.

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Substring announcing that the firmware finished booting
pub const READY_MARKER: &str = "SYSTEM_READY";

/// Commands understood by the alert firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AlertCommand {
    /// Engage the buzzer/relay
    Engage = b'E',
    /// Back to normal
    Normal = b'N',
}

impl AlertCommand {
    /// Byte written to the wire
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

/// Informational messages the firmware prints, recognised by keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceNotice {
    Alert,
    Alcohol,
    Drowsy,
}

impl DeviceNotice {
    /// Classify an inbound line; first matching keyword wins
    pub fn classify(line: &str) -> Option<Self> {
        if line.contains("ALERT") {
            Some(DeviceNotice::Alert)
        } else if line.contains("ALCOHOL") {
            Some(DeviceNotice::Alcohol)
        } else if line.contains("DROWSY") {
            Some(DeviceNotice::Drowsy)
        } else {
            None
        }
    }
}

/// Whether a line carries the ready marker
pub fn is_ready_line(line: &str) -> bool {
    line.contains(READY_MARKER)
}

/// Parse a `...Level...=<int>` telemetry line.
///
/// Takes the text after the last `=`, trimmed.
pub fn try_parse_telemetry(line: &str) -> Result<i32, LinkError> {
    if !(line.contains("Level") && line.contains('=')) {
        return Err(LinkError::TelemetryParse(line.to_string()));
    }
    line.rsplit('=')
        .next()
        .map(str::trim)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| LinkError::TelemetryParse(line.to_string()))
}

/// Telemetry value of a line, `None` for anything malformed or unrelated
pub fn parse_telemetry(line: &str) -> Option<i32> {
    try_parse_telemetry(line).ok()
}

/// Decode raw line bytes, dropping invalid UTF-8 and surrounding whitespace
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_string()
}
