//! Alert Device Link
//!
//! Owns the serial connection to the alert actuator. Every failure leaves
//! the link either usable or in the `Disconnected` (degraded) state where
//! commands are silent no-ops; nothing here aborts the frame loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::discovery::discover_port;
use crate::error::LinkError;
use crate::protocol::{decode_line, is_ready_line, AlertCommand, READY_MARKER};

/// Serial link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Try to use a device at all
    pub enabled: bool,
    /// Explicit port, skips discovery (e.g. "/dev/ttyUSB0" or "COM3")
    pub port: Option<String>,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Upper bound on any single read or write
    pub read_timeout_ms: u64,
    /// Pause after opening; the board resets when the port opens
    pub settle_delay_ms: u64,
    /// How long to wait for the ready marker
    pub handshake_timeout_secs: u64,
    /// Poll interval while waiting for the ready marker
    pub handshake_poll_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
            baud_rate: 9600,
            read_timeout_ms: 1000,
            settle_delay_ms: 2000,
            handshake_timeout_secs: 35,
            handshake_poll_ms: 100,
        }
    }
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn handshake_poll(&self) -> Duration {
        Duration::from_millis(self.handshake_poll_ms)
    }
}

/// Connectivity as seen from outside the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Disconnected,
    AwaitingReady,
    Connected,
}

/// Open port with a line buffer that survives partial reads
struct LinePort<T> {
    io: BufReader<T>,
    pending: Vec<u8>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> LinePort<T> {
    fn new(io: T) -> Self {
        Self {
            io: BufReader::new(io),
            pending: Vec::with_capacity(64),
        }
    }

    /// Return a complete line if one can be had without stalling.
    ///
    /// Returns immediately when nothing is buffered. Once bytes are pending,
    /// waits at most `read_timeout` for the rest of the line.
    async fn poll_line(&mut self, read_timeout: Duration) -> Result<Option<String>, LinkError> {
        let available = match timeout(Duration::ZERO, self.io.fill_buf()).await {
            Err(_) => return Ok(None),
            Ok(Ok(buf)) => buf.len(),
            Ok(Err(e)) => {
                warn!("Serial read failed: {}", e);
                return Err(LinkError::Disconnected);
            }
        };
        if available == 0 {
            return Err(LinkError::Disconnected);
        }

        match timeout(read_timeout, self.io.read_until(b'\n', &mut self.pending)).await {
            // Partial line stays in `pending` for the next poll
            Err(_) => Ok(None),
            Ok(Ok(_)) => {
                let raw = std::mem::take(&mut self.pending);
                let line = decode_line(&raw);
                Ok((!line.is_empty()).then_some(line))
            }
            Ok(Err(e)) => {
                warn!("Serial read failed: {}", e);
                Err(LinkError::Disconnected)
            }
        }
    }

    async fn write_byte(&mut self, byte: u8, write_timeout: Duration) -> Result<(), LinkError> {
        let io = self.io.get_mut();
        let write = async move {
            io.write_all(&[byte]).await?;
            io.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        match timeout(write_timeout, write).await {
            Ok(result) => result.map_err(LinkError::from),
            Err(_) => Err(LinkError::CommandWrite(format!(
                "write timed out after {}ms",
                write_timeout.as_millis()
            ))),
        }
    }
}

/// Connection lifecycle. Only `Connected -> Disconnected` goes backwards.
enum DeviceState<T> {
    Disconnected,
    AwaitingReady { port: LinePort<T>, deadline: Instant },
    Connected(LinePort<T>),
}

/// Link to the alert device
pub struct DeviceLink<T = SerialStream> {
    state: DeviceState<T>,
    port_name: Option<String>,
    config: LinkConfig,
}

impl<T> DeviceLink<T> {
    /// A link with no device behind it; all commands are no-ops
    pub fn absent(config: LinkConfig) -> Self {
        Self {
            state: DeviceState::Disconnected,
            port_name: None,
            config,
        }
    }

    pub fn status(&self) -> LinkStatus {
        match self.state {
            DeviceState::Disconnected => LinkStatus::Disconnected,
            DeviceState::AwaitingReady { .. } => LinkStatus::AwaitingReady,
            DeviceState::Connected(_) => LinkStatus::Connected,
        }
    }

    /// Whether a device is attached (ready or still booting)
    pub fn is_connected(&self) -> bool {
        !matches!(self.state, DeviceState::Disconnected)
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> DeviceLink<T> {
    /// Wrap an already-open stream; the ready deadline starts now
    pub fn from_stream(stream: T, port_name: impl Into<String>, config: LinkConfig) -> Self {
        let deadline = Instant::now() + config.handshake_timeout();
        Self {
            state: DeviceState::AwaitingReady {
                port: LinePort::new(stream),
                deadline,
            },
            port_name: Some(port_name.into()),
            config,
        }
    }

    /// Wait for the ready marker or the handshake deadline.
    ///
    /// A timeout is reported but the link still moves to `Connected`: a slow
    /// device is not an absent one. Does nothing unless awaiting ready.
    pub async fn await_ready(&mut self) -> Result<(), LinkError> {
        let (mut port, deadline) = match std::mem::replace(&mut self.state, DeviceState::Disconnected) {
            DeviceState::AwaitingReady { port, deadline } => (port, deadline),
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let read_timeout = self.config.read_timeout();
        let poll = self.config.handshake_poll();
        info!("Waiting up to {}s for {}", self.config.handshake_timeout_secs, READY_MARKER);

        let result = loop {
            let now = Instant::now();
            if now >= deadline {
                break Err(LinkError::HandshakeTimeout(self.config.handshake_timeout_secs));
            }
            match port.poll_line(read_timeout).await {
                Ok(Some(line)) => {
                    info!(target: "alert_link::device", "{}", line);
                    if is_ready_line(&line) {
                        break Ok(());
                    }
                }
                Ok(None) => sleep_until((now + poll).min(deadline)).await,
                Err(e) => {
                    warn!("Device dropped during handshake, continuing without it");
                    return Err(e);
                }
            }
        };

        self.state = DeviceState::Connected(port);
        match &result {
            Ok(()) => info!("Alert device ready"),
            Err(e) => warn!("{}", e),
        }
        result
    }

    /// Write one command byte.
    ///
    /// A failed write leaves the state untouched so later commands still go
    /// out. Without a device this is a silent no-op.
    pub async fn send_command(&mut self, command: AlertCommand) -> Result<(), LinkError> {
        let write_timeout = self.config.read_timeout();
        let port = match &mut self.state {
            DeviceState::Connected(port) | DeviceState::AwaitingReady { port, .. } => port,
            DeviceState::Disconnected => return Ok(()),
        };
        port.write_byte(command.as_byte(), write_timeout).await?;
        debug!("Sent command {:?}", command);
        Ok(())
    }

    /// Next complete inbound line, if one is available without stalling.
    ///
    /// EOF or a hard read error drops the link to `Disconnected`.
    pub async fn poll_line(&mut self) -> Option<String> {
        let read_timeout = self.config.read_timeout();
        let DeviceState::Connected(port) = &mut self.state else {
            return None;
        };
        match port.poll_line(read_timeout).await {
            Ok(line) => {
                if let Some(line) = &line {
                    debug!(target: "alert_link::device", "{}", line);
                }
                line
            }
            Err(e) => {
                warn!("{}, continuing without alert device", e);
                self.state = DeviceState::Disconnected;
                None
            }
        }
    }

    /// Shut the port down and enter degraded mode
    pub async fn close(&mut self) {
        match std::mem::replace(&mut self.state, DeviceState::Disconnected) {
            DeviceState::Connected(mut port) | DeviceState::AwaitingReady { mut port, .. } => {
                if let Err(e) = port.io.get_mut().shutdown().await {
                    debug!("Error closing serial port: {}", e);
                }
                info!("Alert device disconnected");
            }
            DeviceState::Disconnected => {}
        }
    }
}

impl DeviceLink<SerialStream> {
    /// Open a serial port and start the ready handshake clock.
    ///
    /// Waits out the settle delay before returning.
    pub async fn open(port: &str, config: LinkConfig) -> Result<Self, LinkError> {
        info!("Opening {} at {} baud", port, config.baud_rate);
        let stream = tokio_serial::new(port, config.baud_rate)
            .timeout(config.read_timeout())
            .open_native_async()
            .map_err(|source| LinkError::Open {
                port: port.to_string(),
                source,
            })?;

        tokio::time::sleep(config.settle_delay()).await;
        Ok(Self::from_stream(stream, port, config))
    }

    /// Discover, open and handshake, falling back to degraded mode on failure
    pub async fn connect(config: LinkConfig) -> Self {
        if !config.enabled {
            info!("Alert device disabled, running without it");
            return Self::absent(config);
        }

        let Some(port) = config.port.clone().or_else(discover_port) else {
            warn!("No alert device port, running without it");
            return Self::absent(config);
        };

        let mut link = match Self::open(&port, config.clone()).await {
            Ok(link) => link,
            Err(e) => {
                warn!("{}, running without alert device", e);
                return Self::absent(config);
            }
        };

        // Timeout is already logged and non-fatal
        let _ = link.await_ready().await;
        link
    }
}
