//! Line discipline: raw terminal bytes to one submitted line
//!
//! | Byte value(s) | Meaning                                        |
//! |---------------|------------------------------------------------|
//! | 0x0D, 0x0A    | submit, a paired terminator right after is absorbed |
//! | 0x08, 0x7F    | erase previous character                       |
//! | 0x20–0x7E     | printable ASCII                                |
//! | 0x80–0xFF     | extended character via the terminal charset    |
//! | other         | ignored                                        |
//!
//! With echo on, every insert and erase has a matching visible effect, so
//! the typist's screen line always equals the buffer.

use crate::core::codec::TextEncoding;
use crate::core::transport::{TerminalTransport, TransportError, POLL_SLICE};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Carriage return
pub const CR: u8 = 0x0D;
/// Line feed
pub const LF: u8 = 0x0A;
/// Backspace
pub const BS: u8 = 0x08;
/// Delete
pub const DEL: u8 = 0x7F;

/// How long to wait for the second half of a CR/LF pair
pub const PAIR_WINDOW: Duration = Duration::from_millis(50);

/// Cursor back, blank, cursor back
pub const ERASE_SEQUENCE: &str = "\x08 \x08";

/// Effect of feeding one byte to a [`LineBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Byte had no effect
    Ignored,
    /// Character appended
    Inserted(char),
    /// Last character removed
    Erased,
    /// Line submitted
    Submit,
}

/// Characters accumulated during one line read
#[derive(Debug, Clone)]
pub struct LineBuffer {
    chars: Vec<char>,
    encoding: TextEncoding,
}

impl LineBuffer {
    /// Create an empty buffer decoding extended bytes with `encoding`
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            chars: Vec::new(),
            encoding,
        }
    }

    /// Apply one received byte
    pub fn feed(&mut self, byte: u8) -> LineAction {
        match byte {
            CR | LF => LineAction::Submit,
            BS | DEL => {
                if self.chars.pop().is_some() {
                    LineAction::Erased
                } else {
                    LineAction::Ignored
                }
            }
            0x20..=0x7E | 0x80..=0xFF => match self.encoding.decode_byte(byte) {
                Some(c) => {
                    self.chars.push(c);
                    LineAction::Inserted(c)
                }
                None => LineAction::Ignored,
            },
            _ => LineAction::Ignored,
        }
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Buffered characters as a string
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }
}

fn is_terminator(byte: u8) -> bool {
    byte == CR || byte == LF
}

/// Read one logical line from `term`
///
/// Returns `Some(line)` on submit (possibly empty), the partial buffer if
/// `timeout` elapses after something was typed, and `None` if it elapses
/// with nothing typed or the transport is closed.
pub async fn read_line<T>(
    term: &mut T,
    timeout: Duration,
    echo: bool,
) -> Result<Option<String>, TransportError>
where
    T: TerminalTransport + ?Sized,
{
    if !term.is_open() {
        return Ok(None);
    }
    let echo = echo && !term.echoes_locally();
    let deadline = Instant::now() + timeout;
    let mut line = LineBuffer::new(term.settings().encoding);

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let Some(byte) = term.read_byte(remaining.min(POLL_SLICE)).await? else {
            continue;
        };

        match line.feed(byte) {
            LineAction::Submit => {
                if let Some(next) = term.read_byte(PAIR_WINDOW).await? {
                    if !is_terminator(next) {
                        // Not re-queued: a fast typist can lose this character.
                        debug!("discarded byte 0x{:02x} following line terminator", next);
                    }
                }
                if echo {
                    term.write_line("").await?;
                }
                return Ok(Some(line.as_string()));
            }
            LineAction::Inserted(c) => {
                if echo {
                    let mut utf8 = [0u8; 4];
                    term.write(c.encode_utf8(&mut utf8)).await?;
                }
            }
            LineAction::Erased => {
                if echo {
                    term.write(ERASE_SEQUENCE).await?;
                }
            }
            LineAction::Ignored => {}
        }
    }

    Ok((!line.is_empty()).then(|| line.as_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::ScriptedTransport;

    #[test]
    fn test_backspace_on_empty_is_noop() {
        let mut line = LineBuffer::new(TextEncoding::Latin1);
        assert_eq!(line.feed(BS), LineAction::Ignored);
        assert_eq!(line.feed(DEL), LineAction::Ignored);
        assert!(line.is_empty());
    }

    #[test]
    fn test_backspace_removes_last() {
        let mut line = LineBuffer::new(TextEncoding::Latin1);
        line.feed(b'a');
        line.feed(b'b');
        assert_eq!(line.feed(DEL), LineAction::Erased);
        assert_eq!(line.as_string(), "a");
        assert_eq!(line.feed(BS), LineAction::Erased);
        assert_eq!(line.as_string(), "");
    }

    #[test]
    fn test_control_bytes_ignored() {
        let mut line = LineBuffer::new(TextEncoding::Latin1);
        for byte in [0x00, 0x07, 0x1B, 0x13, 0x1F] {
            assert_eq!(line.feed(byte), LineAction::Ignored);
        }
        assert!(line.is_empty());
    }

    #[test]
    fn test_extended_bytes() {
        let mut latin1 = LineBuffer::new(TextEncoding::Latin1);
        assert_eq!(latin1.feed(0xE9), LineAction::Inserted('é'));

        let mut ascii = LineBuffer::new(TextEncoding::Ascii);
        assert_eq!(ascii.feed(0xE9), LineAction::Ignored);
        assert!(ascii.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_erase_with_echo() {
        let mut term = ScriptedTransport::new().input(&[0x41, 0x42, 0x7F, 0x43, 0x0D]);
        let transcript = term.transcript();
        term.open().await.unwrap();

        let line = term.read_line(Duration::from_secs(10), true).await.unwrap();
        assert_eq!(line.as_deref(), Some("AC"));
        assert_eq!(transcript.bytes(), b"AB\x08 \x08C\r\n".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_echo() {
        let mut term = ScriptedTransport::new().input(b"hi\r");
        let transcript = term.transcript();
        term.open().await.unwrap();

        let line = term.read_line(Duration::from_secs(10), false).await.unwrap();
        assert_eq!(line.as_deref(), Some("hi"));
        assert!(transcript.bytes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crlf_pair_absorbed() {
        let mut term = ScriptedTransport::new().input(b"one\r\ntwo\n");
        term.open().await.unwrap();

        let first = term.read_line(Duration::from_secs(10), false).await.unwrap();
        let second = term.read_line(Duration::from_secs(10), false).await.unwrap();
        assert_eq!(first.as_deref(), Some("one"));
        assert_eq!(second.as_deref(), Some("two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_byte_after_terminator_is_dropped() {
        let mut term = ScriptedTransport::new().input(b"one\rxy\r");
        term.open().await.unwrap();

        let first = term.read_line(Duration::from_secs(10), false).await.unwrap();
        let second = term.read_line(Duration::from_secs(10), false).await.unwrap();
        assert_eq!(first.as_deref(), Some("one"));
        assert_eq!(second.as_deref(), Some("y"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_submit_differs_from_timeout() {
        let mut term = ScriptedTransport::new().input(b"\r");
        term.open().await.unwrap();

        let submitted = term.read_line(Duration::from_secs(10), false).await.unwrap();
        assert_eq!(submitted.as_deref(), Some(""));

        let start = Instant::now();
        let timed_out = term.read_line(Duration::from_secs(3), false).await.unwrap();
        assert_eq!(timed_out, None);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_partial() {
        let mut term = ScriptedTransport::new().input(b"partial");
        term.open().await.unwrap();

        let line = term.read_line(Duration::from_secs(2), false).await.unwrap();
        assert_eq!(line.as_deref(), Some("partial"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_transport_returns_none() {
        let mut term = ScriptedTransport::new().input(b"x\r");
        let line = term.read_line(Duration::from_secs(2), true).await.unwrap();
        assert_eq!(line, None);
    }
}
