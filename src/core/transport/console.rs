//! Host console transport, a keyboard/screen stand-in for the terminal
//!
//! Stdin is read on a dedicated thread in the host's line-buffered mode:
//! each typed line is transcoded to the terminal charset and forwarded
//! byte by byte over a channel, followed by a line feed. Output is decoded
//! back from the terminal charset before printing, so the operator sees what
//! the terminal would show.

use super::{pace, trace_received, LinkSettings, TerminalTransport, TransportError, TransportType};
use async_trait::async_trait;
use crossbeam_channel::{Receiver, TryRecvError};
use std::io::{BufRead, Write};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Blank lines printed in place of a screen clear
const CLEAR_LINES: usize = 5;

/// How often the input channel is polled while waiting for a key
const INPUT_POLL: Duration = Duration::from_millis(20);

/// Console transport
pub struct ConsoleTransport {
    settings: LinkSettings,
    open: bool,
    input: Option<Receiver<u8>>,
    interrupt: CancellationToken,
}

impl ConsoleTransport {
    /// Create a new, closed console transport
    pub fn new(settings: LinkSettings, interrupt: CancellationToken) -> Self {
        Self {
            settings,
            open: false,
            input: None,
            interrupt,
        }
    }

    fn spawn_reader(&self) -> Result<Receiver<u8>, TransportError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let encoding = self.settings.encoding;

        std::thread::Builder::new()
            .name("console-stdin".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    for byte in encoding.encode(&line) {
                        if tx.send(byte).is_err() {
                            return;
                        }
                    }
                    if tx.send(b'\n').is_err() {
                        return;
                    }
                }
                debug!("console stdin closed");
            })?;

        Ok(rx)
    }
}

#[async_trait]
impl TerminalTransport for ConsoleTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        // The reader thread outlives close/reopen cycles: stdin has one reader.
        if self.input.is_none() {
            self.input = Some(self.spawn_reader()?);
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Console
    }

    fn connection_info(&self) -> String {
        "console (stdin/stdout)".to_string()
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

    fn echoes_locally(&self) -> bool {
        true
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Ok(());
        }
        let text = self.settings.encoding.decode(data);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        if !self.open {
            return Ok(None);
        }
        let Some(input) = self.input.as_ref() else {
            return Ok(None);
        };
        let deadline = Instant::now() + timeout;

        loop {
            if self.interrupt.is_cancelled() {
                return Err(TransportError::Interrupted);
            }
            match input.try_recv() {
                Ok(byte) => {
                    trace_received(&self.settings, byte);
                    return Ok(Some(byte));
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return Err(TransportError::Disconnected),
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            pace(remaining.min(INPUT_POLL), &self.interrupt).await?;
        }
    }

    async fn clear(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Ok(());
        }
        self.send("\n".repeat(CLEAR_LINES).as_bytes()).await
    }
}
