//! Line input from the host's stdin
//!
//! Stdin is read on its own thread so waiting for the operator never blocks
//! the runtime and an interrupt is noticed within one poll slice.

use crate::core::transport::POLL_SLICE;
use crossbeam_channel::{Receiver, TryRecvError};
use std::io::{self, BufRead};
use std::thread;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Stdin line reader
pub struct StdinLineReader {
    receiver: Receiver<String>,
}

impl StdinLineReader {
    /// Start reading stdin
    pub fn spawn() -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();

        thread::Builder::new()
            .name("host-stdin".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    if sender.send(line).is_err() {
                        return;
                    }
                }
                debug!("host stdin closed");
            })?;

        Ok(Self { receiver })
    }

    /// Read lines from an existing channel
    pub fn from_receiver(receiver: Receiver<String>) -> Self {
        Self { receiver }
    }

    /// Next line without its terminator
    ///
    /// `None` once stdin is closed or `interrupt` fires.
    pub async fn next_line(&self, interrupt: &CancellationToken) -> Option<String> {
        loop {
            if interrupt.is_cancelled() {
                return None;
            }
            match self.receiver.try_recv() {
                Ok(line) => return Some(line),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => tokio::time::sleep(POLL_SLICE).await,
            }
        }
    }
}
