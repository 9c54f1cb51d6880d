//! Alert Device Link
//!
//! Serial communication with the microcontroller that drives the alert
//! actuator and reports alcohol sensor readings. Handles port discovery,
//! the boot-time ready handshake, single-byte commands and line-oriented
//! telemetry, and degrades to a no-op link whenever the device is absent.

mod discovery;
mod error;
mod link;
mod protocol;

pub use discovery::{
    discover_port, list_ports, matches_device, select_port, try_discover_port, PortCandidate,
    DEVICE_KEYWORDS,
};
pub use error::LinkError;
pub use link::{DeviceLink, LinkConfig, LinkStatus};
pub use protocol::{
    decode_line, is_ready_line, parse_telemetry, try_parse_telemetry, AlertCommand, DeviceNotice,
    READY_MARKER,
};

pub use tokio_serial::SerialStream;

/// The link over a real serial port
pub type SerialLink = DeviceLink<SerialStream>;
