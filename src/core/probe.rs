//! Link auto-configuration
//!
//! The terminal's framing is unknown up front. Each candidate framing is
//! tried in a fixed order: a test message is sent and the person at the
//! terminal confirms they can read it by typing `y`. The first confirmed
//! candidate wins. Choosing the physical port is always left to the operator.

use crate::core::codec::hexdump;
use crate::core::transport::{
    SerialConfig, SerialParity, TerminalTransport, TransportError, POLL_SLICE,
};
use crate::i18n::t;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// How long each candidate waits for a confirmation
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(6);

/// How long to keep draining after a confirmation (the Enter that follows it)
pub const DRAIN_WINDOW: Duration = Duration::from_millis(300);

/// One framing to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits
    pub data_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Stop bits
    pub stop_bits: u8,
    /// Short label shown on both screens
    pub label: &'static str,
}

impl LinkCandidate {
    const fn new(
        baud_rate: u32,
        data_bits: u8,
        parity: SerialParity,
        label: &'static str,
    ) -> Self {
        Self {
            baud_rate,
            data_bits,
            parity,
            stop_bits: 1,
            label,
        }
    }

    /// Serial configuration for this candidate on `port`
    pub fn config_for(&self, port: &str) -> SerialConfig {
        SerialConfig::new(port, self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
    }
}

impl fmt::Display for LinkCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

/// Candidate framings, most likely first
///
/// A Minitel 1 powers up at 1200 baud 7E1; later models also run at 4800.
pub const LINK_CANDIDATES: [LinkCandidate; 10] = [
    LinkCandidate::new(1200, 7, SerialParity::Even, "1200 7E1"),
    LinkCandidate::new(4800, 7, SerialParity::Even, "4800 7E1"),
    LinkCandidate::new(1200, 8, SerialParity::None, "1200 8N1"),
    LinkCandidate::new(4800, 8, SerialParity::None, "4800 8N1"),
    LinkCandidate::new(9600, 7, SerialParity::Even, "9600 7E1"),
    LinkCandidate::new(9600, 8, SerialParity::None, "9600 8N1"),
    LinkCandidate::new(300, 7, SerialParity::Even, "300 7E1"),
    LinkCandidate::new(2400, 7, SerialParity::Even, "2400 7E1"),
    LinkCandidate::new(1200, 7, SerialParity::None, "1200 7N1"),
    LinkCandidate::new(4800, 7, SerialParity::None, "4800 7N1"),
];

/// Result of trying one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// The operator typed the confirmation
    Confirmed,
    /// Nothing confirmed within the window
    NoResponse,
    /// The port could not be opened with this framing
    OpenFailed(String),
    /// The test message could not be sent
    WriteFailed(String),
    /// Reading the reply failed
    ReadFailed(String),
}

/// One candidate and how it went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    /// Candidate tried
    pub candidate: LinkCandidate,
    /// Verdict
    pub verdict: ProbeVerdict,
}

/// Result of one pass over the candidates
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Confirmed configuration, if any
    pub found: Option<SerialConfig>,
    /// Every attempt in order
    pub attempts: Vec<ProbeAttempt>,
}

/// Operator's answer to the port prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortChoice {
    /// Index into the offered port list
    Selected(usize),
    /// List ports again
    Rescan,
    /// Give up
    Abort,
}

/// Prober errors
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Interrupted by the operator
    #[error("Probe interrupted")]
    Interrupted,

    /// Ports could not be listed
    #[error("Port enumeration failed: {0}")]
    Enumeration(#[source] TransportError),

    /// Operator picked a port that was not offered
    #[error("Invalid port selection: {0}")]
    InvalidSelection(usize),
}

/// Host-side operator dialogue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProbeOperator: Send {
    /// Pick a port among `ports` (possibly empty)
    async fn select_port(&mut self, ports: &[String]) -> PortChoice;

    /// A candidate is about to be tried
    fn attempt_started(&mut self, candidate: &LinkCandidate);

    /// A candidate has been tried
    fn attempt_finished(&mut self, candidate: &LinkCandidate, verdict: &ProbeVerdict);

    /// A full pass failed; retry from port selection?
    async fn confirm_retry(&mut self, attempts: &[ProbeAttempt]) -> bool;
}

/// Localized test message for `candidate`
pub fn probe_message(candidate: &LinkCandidate) -> String {
    format!(
        "\r\n{} {}\r\n{}\r\n{}\r\n> ",
        t("probe.test"),
        candidate.label,
        t("probe.read_this"),
        t("probe.type_y"),
    )
}

/// Candidate scanner
pub struct LinkProber<F> {
    factory: F,
    candidates: Vec<LinkCandidate>,
    window: Duration,
    interrupt: CancellationToken,
}

impl<F> LinkProber<F>
where
    F: FnMut(&SerialConfig) -> Box<dyn TerminalTransport> + Send,
{
    /// Create a prober over [`LINK_CANDIDATES`]
    pub fn new(factory: F, interrupt: CancellationToken) -> Self {
        Self {
            factory,
            candidates: LINK_CANDIDATES.to_vec(),
            window: DEFAULT_WINDOW,
            interrupt,
        }
    }

    /// Replace the candidate table
    #[must_use]
    pub fn candidates(mut self, candidates: &[LinkCandidate]) -> Self {
        self.candidates = candidates.to_vec();
        self
    }

    /// Set the confirmation window
    #[must_use]
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Operator loop: select a port, scan it, retry or give up
    ///
    /// Returns `None` when the operator abandons.
    pub async fn run<O, L>(
        &mut self,
        operator: &mut O,
        mut list_ports: L,
    ) -> Result<Option<SerialConfig>, ProbeError>
    where
        O: ProbeOperator + ?Sized,
        L: FnMut() -> Result<Vec<String>, TransportError> + Send,
    {
        loop {
            if self.interrupt.is_cancelled() {
                return Err(ProbeError::Interrupted);
            }
            let ports = list_ports().map_err(ProbeError::Enumeration)?;
            debug!("{} serial port(s) found", ports.len());

            let port = match operator.select_port(&ports).await {
                PortChoice::Abort => return Ok(None),
                PortChoice::Rescan => continue,
                PortChoice::Selected(index) => ports
                    .get(index)
                    .cloned()
                    .ok_or(ProbeError::InvalidSelection(index))?,
            };

            let report = self.scan(&port, operator).await?;
            if let Some(config) = report.found {
                return Ok(Some(config));
            }
            if !operator.confirm_retry(&report.attempts).await {
                return Ok(None);
            }
        }
    }

    /// Try every candidate on `port` in order, stopping at the first confirmed
    pub async fn scan<O>(&mut self, port: &str, operator: &mut O) -> Result<ScanReport, ProbeError>
    where
        O: ProbeOperator + ?Sized,
    {
        let mut report = ScanReport::default();
        info!("probing {} ({} candidates)", port, self.candidates.len());

        for candidate in self.candidates.clone() {
            if self.interrupt.is_cancelled() {
                return Err(ProbeError::Interrupted);
            }
            operator.attempt_started(&candidate);
            let verdict = self.try_candidate(port, &candidate).await?;
            operator.attempt_finished(&candidate, &verdict);

            let confirmed = verdict == ProbeVerdict::Confirmed;
            report.attempts.push(ProbeAttempt { candidate, verdict });
            if confirmed {
                info!("link confirmed: {} @ {}", port, candidate);
                report.found = Some(candidate.config_for(port));
                break;
            }
        }

        Ok(report)
    }

    /// Open `port` with one candidate framing and wait for a confirmation
    pub async fn try_candidate(
        &mut self,
        port: &str,
        candidate: &LinkCandidate,
    ) -> Result<ProbeVerdict, ProbeError> {
        let config = candidate.config_for(port);
        let mut term = (self.factory)(&config);

        if let Err(e) = term.open().await {
            debug!("{}: open failed: {}", config, e);
            return Ok(ProbeVerdict::OpenFailed(e.to_string()));
        }
        let verdict = self.await_confirmation(term.as_mut(), candidate).await;
        term.close().await;
        verdict
    }

    async fn await_confirmation(
        &self,
        term: &mut dyn TerminalTransport,
        candidate: &LinkCandidate,
    ) -> Result<ProbeVerdict, ProbeError> {
        if let Err(e) = term.write(&probe_message(candidate)).await {
            warn!("{}: test message not sent: {}", candidate, e);
            return Ok(ProbeVerdict::WriteFailed(e.to_string()));
        }

        let deadline = Instant::now() + self.window;
        let mut noise = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if !noise.is_empty() {
                    debug!("{}: received without confirmation:\n{}", candidate, hexdump(&noise, 16));
                }
                return Ok(ProbeVerdict::NoResponse);
            }
            match term.read_byte(remaining.min(POLL_SLICE)).await {
                Ok(Some(b'y' | b'Y')) => {
                    drain(term).await?;
                    return Ok(ProbeVerdict::Confirmed);
                }
                Ok(Some(byte)) => {
                    trace!("{}: ignoring 0x{:02x}", candidate, byte);
                    noise.push(byte);
                }
                Ok(None) => {}
                Err(e) if e.is_interrupt() => return Err(ProbeError::Interrupted),
                Err(e) => {
                    warn!("{}: read failed: {}", candidate, e);
                    return Ok(ProbeVerdict::ReadFailed(e.to_string()));
                }
            }
        }
    }
}

/// Swallow whatever follows the confirmation so it does not reach the shell
async fn drain(term: &mut dyn TerminalTransport) -> Result<(), ProbeError> {
    let deadline = Instant::now() + DRAIN_WINDOW;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        match term.read_byte(remaining).await {
            Ok(Some(byte)) => trace!("drained 0x{:02x}", byte),
            Ok(None) => return Ok(()),
            Err(e) if e.is_interrupt() => return Err(ProbeError::Interrupted),
            Err(e) => {
                debug!("drain stopped: {}", e);
                return Ok(());
            }
        }
    }
}
