//! Scripted transport: queued input bytes, captured output

use super::{
    trace_received, LinkSettings, TerminalTransport, TransportError, TransportType,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Transcript {
    bytes: Vec<u8>,
    send_calls: usize,
    opens: usize,
    clears: usize,
}

/// Shared view of everything a [`ScriptedTransport`] was asked to send
#[derive(Debug, Clone, Default)]
pub struct TranscriptHandle {
    inner: Arc<Mutex<Transcript>>,
}

impl TranscriptHandle {
    /// Raw bytes sent so far
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().bytes.clone()
    }

    /// Sent bytes decoded as Latin-1
    pub fn text(&self) -> String {
        self.inner.lock().bytes.iter().map(|&b| char::from(b)).collect()
    }

    /// Number of `send` calls
    pub fn send_calls(&self) -> usize {
        self.inner.lock().send_calls
    }

    /// Number of successful opens
    pub fn opens(&self) -> usize {
        self.inner.lock().opens
    }

    /// Number of screen clears
    pub fn clears(&self) -> usize {
        self.inner.lock().clears
    }
}

/// Transport that replays queued input and records output
///
/// When the input queue is empty a read waits out its full timeout on the
/// tokio clock, so tests running with a paused clock see real deadline
/// behavior without real waiting.
pub struct ScriptedTransport {
    settings: LinkSettings,
    open: bool,
    fail_open: bool,
    hang_up_when_drained: bool,
    failing_sends: usize,
    input: VecDeque<u8>,
    transcript: TranscriptHandle,
    interrupt: CancellationToken,
}

impl ScriptedTransport {
    /// Create a closed transport with default settings
    pub fn new() -> Self {
        Self::with_settings(LinkSettings::default())
    }

    /// Create a closed transport with the given settings
    pub fn with_settings(settings: LinkSettings) -> Self {
        Self {
            settings,
            open: false,
            fail_open: false,
            hang_up_when_drained: false,
            failing_sends: 0,
            input: VecDeque::new(),
            transcript: TranscriptHandle::default(),
            interrupt: CancellationToken::new(),
        }
    }

    /// Queue bytes to be read
    #[must_use]
    pub fn input(mut self, bytes: &[u8]) -> Self {
        self.input.extend(bytes);
        self
    }

    /// Make `open` fail
    #[must_use]
    pub fn fail_open(mut self, fail: bool) -> Self {
        self.fail_open = fail;
        self
    }

    /// Report `Disconnected` once the input queue is drained
    #[must_use]
    pub fn hang_up_when_drained(mut self, hang_up: bool) -> Self {
        self.hang_up_when_drained = hang_up;
        self
    }

    /// Make the next `count` sends fail with an I/O error
    #[must_use]
    pub fn failing_sends(mut self, count: usize) -> Self {
        self.failing_sends = count;
        self
    }

    /// Observe reads through this token
    #[must_use]
    pub fn interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    /// Queue more bytes to be read
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Handle on the captured output
    pub fn transcript(&self) -> TranscriptHandle {
        self.transcript.clone()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminalTransport for ScriptedTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.fail_open {
            return Err(TransportError::PortNotFound("scripted".to_string()));
        }
        self.open = true;
        self.transcript.inner.lock().opens += 1;
        Ok(())
    }

    async fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Scripted
    }

    fn connection_info(&self) -> String {
        format!("scripted ({} bytes queued)", self.input.len())
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
        if !self.open {
            return Ok(());
        }
        if self.failing_sends > 0 {
            self.failing_sends -= 1;
            return Err(TransportError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted send failure",
            )));
        }
        let mut transcript = self.transcript.inner.lock();
        transcript.bytes.extend_from_slice(data);
        transcript.send_calls += 1;
        Ok(())
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        if self.interrupt.is_cancelled() {
            return Err(TransportError::Interrupted);
        }
        if !self.open {
            return Ok(None);
        }
        if let Some(byte) = self.input.pop_front() {
            trace_received(&self.settings, byte);
            return Ok(Some(byte));
        }
        if self.hang_up_when_drained {
            return Err(TransportError::Disconnected);
        }
        tokio::select! {
            () = self.interrupt.cancelled() => Err(TransportError::Interrupted),
            () = tokio::time::sleep(timeout) => Ok(None),
        }
    }

    async fn clear(&mut self) -> Result<(), TransportError> {
        if self.open {
            self.transcript.inner.lock().clears += 1;
        }
        Ok(())
    }
}
