//! Transport layer for the terminal link
//!
//! Supports:
//! - Serial ports (the physical Minitel link)
//! - The host console (stdin/stdout stand-in for running without hardware)
//! - Scripted byte streams (tests and hardware-free runs)
//!
//! Every variant implements the same [`TerminalTransport`] capability set.
//! Variants only provide the byte primitives; text writing, line pacing,
//! line assembly and pagination flags are shared.

mod console;
mod scripted;
mod serial;

pub use console::ConsoleTransport;
pub use scripted::{ScriptedTransport, TranscriptHandle};
pub use serial::{list_ports, SerialConfig, SerialParity, SerialTransport};

use crate::core::codec::{describe_byte, TextEncoding};
use crate::core::line_discipline;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Longest single blocking wait inside any read, so interrupts are seen promptly
pub const POLL_SLICE: Duration = Duration::from_millis(100);

/// Line terminator sent to the terminal
pub const LINE_TERMINATOR: &str = "\r\n";

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Serial port
    Serial,
    /// Host console
    Console,
    /// Scripted input/captured output
    Scripted,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Console => write!(f, "Console"),
            Self::Scripted => write!(f, "Scripted"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Port already in use
    #[error("Port already in use: {0}")]
    PortInUse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Peer went away (device unplugged, stdin closed)
    #[error("Disconnected")]
    Disconnected,

    /// Interrupted by the operator
    #[error("Interrupted")]
    Interrupted,
}

impl TransportError {
    /// Whether this error is an operator interrupt rather than a link failure
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Per-endpoint pacing and display settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Pause after every written line (print-speed throttle for slow hardware)
    pub line_delay: Duration,
    /// Pause after every written byte, zero writes whole buffers at once
    pub char_delay: Duration,
    /// Whether the formatter pauses every page
    pub pagination: bool,
    /// Terminal charset
    pub encoding: TextEncoding,
    /// Log every received byte
    pub trace_rx: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            line_delay: Duration::ZERO,
            char_delay: Duration::ZERO,
            pagination: true,
            encoding: TextEncoding::Latin1,
            trace_rx: false,
        }
    }
}

impl LinkSettings {
    /// Set the inter-line delay
    #[must_use]
    pub fn line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }

    /// Set the inter-character delay
    #[must_use]
    pub fn char_delay(mut self, delay: Duration) -> Self {
        self.char_delay = delay;
        self
    }

    /// Set the terminal charset
    #[must_use]
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enable receive tracing
    #[must_use]
    pub fn trace_rx(mut self, enable: bool) -> Self {
        self.trace_rx = enable;
        self
    }
}

/// Capability set shared by every terminal link
#[async_trait]
pub trait TerminalTransport: Send {
    /// Acquire the underlying channel
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Release the underlying channel, closing a closed transport is a no-op
    async fn close(&mut self);

    /// Check if open
    fn is_open(&self) -> bool;

    /// Get transport type
    fn transport_type(&self) -> TransportType;

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Pacing and display settings
    fn settings(&self) -> &LinkSettings;

    /// Mutable pacing and display settings
    fn settings_mut(&mut self) -> &mut LinkSettings;

    /// Token that unwinds reads and pacing waits
    fn interrupt(&self) -> &CancellationToken;

    /// Send raw bytes, no charset conversion and no pacing
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Next received byte, `None` once `timeout` has elapsed without data
    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError>;

    /// Clear the screen (or the closest approximation)
    async fn clear(&mut self) -> Result<(), TransportError>;

    /// Whether the far end already echoes typed characters itself
    fn echoes_locally(&self) -> bool {
        false
    }

    /// Close then open again
    async fn reopen(&mut self) -> Result<(), TransportError> {
        self.close().await;
        self.open().await
    }

    /// Write text in the terminal charset
    async fn write(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.is_open() || text.is_empty() {
            return Ok(());
        }
        let data = self.settings().encoding.encode(text);
        let char_delay = self.settings().char_delay;
        if char_delay.is_zero() {
            return self.send(&data).await;
        }
        let interrupt = self.interrupt().clone();
        for byte in data {
            self.send(&[byte]).await?;
            pace(char_delay, &interrupt).await?;
        }
        Ok(())
    }

    /// Write text followed by a line terminator, then wait the line delay
    async fn write_line(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Ok(());
        }
        self.write(&format!("{text}{LINE_TERMINATOR}")).await?;
        let line_delay = self.settings().line_delay;
        if line_delay.is_zero() {
            return Ok(());
        }
        let interrupt = self.interrupt().clone();
        pace(line_delay, &interrupt).await
    }

    /// Read one logical line, see [`line_discipline::read_line`]
    async fn read_line(
        &mut self,
        timeout: Duration,
        echo: bool,
    ) -> Result<Option<String>, TransportError> {
        line_discipline::read_line(self, timeout, echo).await
    }

    /// Wait for any key press, used to pace pagination
    async fn wait_keypress(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        self.read_byte(timeout).await
    }

    /// Turn pagination pauses on or off
    fn set_pagination(&mut self, enabled: bool) {
        self.settings_mut().pagination = enabled;
    }

    /// Whether pagination pauses are on
    fn pagination_enabled(&self) -> bool {
        self.settings().pagination
    }
}

/// Wait out a pacing delay unless the operator interrupts first
pub(crate) async fn pace(
    delay: Duration,
    interrupt: &CancellationToken,
) -> Result<(), TransportError> {
    tokio::select! {
        () = interrupt.cancelled() => Err(TransportError::Interrupted),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Emit a receive trace line when tracing is enabled
pub(crate) fn trace_received(settings: &LinkSettings, byte: u8) {
    if settings.trace_rx {
        tracing::info!(target: "minitel::rx", "RX: {}", describe_byte(byte));
    }
}
