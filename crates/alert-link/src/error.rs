//! Alert link error types
//!
//! None of these are fatal: callers log them and carry on in degraded mode.

use thiserror::Error;

/// Errors that can occur while talking to the alert device
#[derive(Debug, Error)]
pub enum LinkError {
    /// No serial port matched the device keywords
    #[error("No alert device found among {0} serial port(s)")]
    Discovery(usize),

    /// Enumerating serial ports failed
    #[error("Serial port enumeration failed: {0}")]
    Enumeration(#[source] tokio_serial::Error),

    /// Opening the serial port failed
    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Ready marker not seen before the deadline
    #[error("Device not ready after {0}s, continuing anyway")]
    HandshakeTimeout(u64),

    /// Writing a command byte failed
    #[error("Command write failed: {0}")]
    CommandWrite(String),

    /// A telemetry line could not be parsed
    #[error("Malformed telemetry line: {0:?}")]
    TelemetryParse(String),

    /// The device closed the link or the read failed hard
    #[error("Device disconnected")]
    Disconnected,
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::CommandWrite(err.to_string())
    }
}
