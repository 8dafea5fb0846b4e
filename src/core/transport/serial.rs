//! Serial port transport implementation

use super::{
    pace, trace_received, LinkSettings, TerminalTransport, TransportError, TransportType, POLL_SLICE,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Upper bound for one blocking write
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Settle time after a form feed before the terminal accepts more text
const CLEAR_SETTLE: Duration = Duration::from_millis(100);

/// Form feed, clears a Minitel screen
const FORM_FEED: u8 = 0x0C;

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialParity {
    /// No parity
    #[serde(rename = "N", alias = "none")]
    None,
    /// Odd parity
    #[serde(rename = "O", alias = "odd")]
    Odd,
    /// Even parity
    #[default]
    #[serde(rename = "E", alias = "even")]
    Even,
}

impl SerialParity {
    /// One-letter code used in link labels (`7E1`)
    pub fn code(self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
        }
    }
}

impl std::str::FromStr for SerialParity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            other => Err(format!("unknown parity: {other}")),
        }
    }
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., /dev/cu.usbserial-1234, COM3)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (7, 8)
    pub data_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
}

impl SerialConfig {
    /// Create a new serial configuration with the Minitel's factory framing (7E1)
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: 7,
            parity: SerialParity::Even,
            stop_bits: 1,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }

    /// Framing label such as `1200 7E1`
    pub fn label(&self) -> String {
        format!(
            "{} {}{}{}",
            self.baud_rate,
            self.data_bits,
            self.parity.code(),
            self.stop_bits
        )
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", 1200)
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.port, self.label())
    }
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    settings: LinkSettings,
    port: Option<Box<dyn SerialPort>>,
    interrupt: CancellationToken,
}

impl SerialTransport {
    /// Create a new, closed serial transport
    pub fn new(config: SerialConfig, settings: LinkSettings, interrupt: CancellationToken) -> Self {
        Self {
            config,
            settings,
            port: None,
            interrupt,
        }
    }

    /// Link parameters
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Run one blocking port operation on the blocking pool
    ///
    /// The port moves into the worker and comes back with the result, so the
    /// runtime thread keeps serving timers and the interrupt token meanwhile.
    /// A worker that panics leaves the transport closed.
    async fn on_port<R, F>(&mut self, op: F) -> Result<R, TransportError>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> Result<R, TransportError> + Send + 'static,
    {
        let Some(mut port) = self.port.take() else {
            return Err(TransportError::Disconnected);
        };
        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = op(port.as_mut());
            (port, result)
        })
        .await
        .map_err(|e| TransportError::ConnectionFailed(format!("serial worker failed: {e}")))?;
        self.port = Some(port);
        result
    }
}

fn serial_io_error(e: serialport::Error) -> TransportError {
    TransportError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[async_trait]
impl TerminalTransport for SerialTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let data_bits = match self.config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };

        let stop_bits = match self.config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };

        let parity = match self.config.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        };

        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(FlowControl::None)
            .timeout(POLL_SLICE)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    TransportError::PortNotFound(self.config.port.clone())
                }
                serialport::ErrorKind::Io(io_kind) => match io_kind {
                    std::io::ErrorKind::PermissionDenied => {
                        TransportError::PermissionDenied(self.config.port.clone())
                    }
                    std::io::ErrorKind::NotFound => {
                        TransportError::PortNotFound(self.config.port.clone())
                    }
                    std::io::ErrorKind::AddrInUse => {
                        TransportError::PortInUse(self.config.port.clone())
                    }
                    _ => TransportError::ConnectionFailed(e.to_string()),
                },
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        debug!("opened {}", self.config);
        self.port = Some(port);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush() {
                warn!("flush on close failed for {}: {}", self.config.port, e);
            }
            debug!("closed {}", self.config);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Serial
    }

    fn connection_info(&self) -> String {
        self.config.to_string()
    }

    fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut LinkSettings {
        &mut self.settings
    }

    fn interrupt(&self) -> &CancellationToken {
        &self.interrupt
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Ok(());
        }
        trace!(target: "minitel::tx", "TX {}", hex::encode(data));
        let data = data.to_vec();
        self.on_port(move |port| {
            port.set_timeout(WRITE_TIMEOUT).map_err(serial_io_error)?;
            port.write_all(&data)?;
            port.flush()?;
            Ok(())
        })
        .await
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        if !self.is_open() {
            return Ok(None);
        }
        let deadline = Instant::now() + timeout;

        loop {
            if self.interrupt.is_cancelled() {
                return Err(TransportError::Interrupted);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let slice = remaining.min(POLL_SLICE).max(Duration::from_millis(1));

            let received = self
                .on_port(move |port| {
                    port.set_timeout(slice).map_err(serial_io_error)?;
                    let mut buf = [0u8; 1];
                    match port.read(&mut buf) {
                        Ok(1) => Ok(Some(buf[0])),
                        Ok(_) => Ok(None),
                        Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
                        Err(e) => Err(TransportError::IoError(e)),
                    }
                })
                .await?;
            if let Some(byte) = received {
                trace_received(&self.settings, byte);
                return Ok(Some(byte));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    async fn clear(&mut self) -> Result<(), TransportError> {
        if !self.is_open() {
            return Ok(());
        }
        self.send(&[FORM_FEED]).await?;
        pace(CLEAR_SETTLE, &self.interrupt).await
    }
}

/// List available serial ports, `/dev/cu.*` call-out devices first
pub fn list_ports() -> Result<Vec<String>, TransportError> {
    let ports = serialport::available_ports().map_err(serial_io_error)?;
    let (mut callout, other): (Vec<String>, Vec<String>) = ports
        .into_iter()
        .map(|p| p.port_name)
        .partition(|name| name.starts_with("/dev/cu."));
    callout.extend(other);
    Ok(callout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        let config = SerialConfig::new("/dev/cu.usbserial", 1200);
        assert_eq!(config.label(), "1200 7E1");
        let config = config.data_bits(8).parity(SerialParity::None);
        assert_eq!(config.label(), "1200 8N1");
    }

    #[test]
    fn test_parity_serde_codes() {
        assert_eq!(serde_json::to_string(&SerialParity::Even).unwrap(), "\"E\"");
        let parity: SerialParity = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parity, SerialParity::None);
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!("E".parse::<SerialParity>(), Ok(SerialParity::Even));
        assert_eq!("none".parse::<SerialParity>(), Ok(SerialParity::None));
        assert!("x".parse::<SerialParity>().is_err());
    }

    #[tokio::test]
    async fn test_closed_port_is_inert() {
        let mut transport = SerialTransport::new(
            SerialConfig::default(),
            LinkSettings::default(),
            CancellationToken::new(),
        );
        assert!(!transport.is_open());
        transport.write("ignored").await.unwrap();
        assert_eq!(transport.read_byte(Duration::from_millis(10)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_missing_port_fails_cleanly() {
        let mut transport = SerialTransport::new(
            SerialConfig::new("/dev/does-not-exist-minitel", 1200),
            LinkSettings::default(),
            CancellationToken::new(),
        );
        assert!(transport.open().await.is_err());
        assert!(!transport.is_open());
    }
}
