//! Serial port discovery
//!
//! Picks the first port whose human-readable description looks like a
//! microcontroller board or a common USB-serial bridge chip.

use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

use crate::error::LinkError;

/// Case-insensitive description keywords identifying the alert device
pub const DEVICE_KEYWORDS: [&str; 5] = ["ARDUINO", "CH340", "USB-SERIAL", "USB SERIAL", "CP210"];

/// An enumerated serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    /// Device path (e.g. "/dev/ttyUSB0" or "COM3")
    pub name: String,
    /// Human-readable description
    pub description: String,
}

impl From<SerialPortInfo> for PortCandidate {
    fn from(info: SerialPortInfo) -> Self {
        let description = describe(&info);
        Self {
            name: info.port_name,
            description,
        }
    }
}

/// Build a description from whatever the OS reports about the port
fn describe(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let parts: Vec<&str> = [usb.product.as_deref(), usb.manufacturer.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if parts.is_empty() {
                format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid)
            } else {
                parts.join(" ")
            }
        }
        SerialPortType::PciPort => "PCI serial port".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial port".to_string(),
        SerialPortType::Unknown => info.port_name.clone(),
    }
}

/// Whether a port description matches one of [`DEVICE_KEYWORDS`]
pub fn matches_device(description: &str) -> bool {
    let upper = description.to_uppercase();
    DEVICE_KEYWORDS.iter().any(|keyword| upper.contains(keyword))
}

/// First candidate whose description matches
pub fn select_port(candidates: &[PortCandidate]) -> Option<&PortCandidate> {
    candidates.iter().find(|c| matches_device(&c.description))
}

/// Enumerate the serial ports present on this machine
pub fn list_ports() -> Result<Vec<PortCandidate>, LinkError> {
    let ports = tokio_serial::available_ports().map_err(LinkError::Enumeration)?;
    Ok(ports.into_iter().map(PortCandidate::from).collect())
}

/// Find the alert device's port
pub fn try_discover_port() -> Result<String, LinkError> {
    let candidates = list_ports()?;
    for candidate in &candidates {
        debug!("Serial port {}: {}", candidate.name, candidate.description);
    }
    select_port(&candidates)
        .map(|c| c.name.clone())
        .ok_or(LinkError::Discovery(candidates.len()))
}

/// Find the alert device's port, `None` if nothing matched
pub fn discover_port() -> Option<String> {
    match try_discover_port() {
        Ok(port) => {
            info!("Alert device found on {}", port);
            Some(port)
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}
