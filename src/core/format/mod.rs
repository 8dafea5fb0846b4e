//! Streaming formatter
//!
//! Reflows text to the terminal width and paginates it. Whole text and
//! chunked streams go through the same greedy layout, so a given text
//! produces byte-identical terminal output whichever entry point shows it.
//!
//! Pagination counts emitted lines. Once `page_height` lines have been
//! written since the last pause, the next piece of output is preceded by a
//! "more" marker and a key press; output that ends exactly on a page
//! boundary does not pause.

mod layout;
mod stream;

pub use layout::wrap_text;
pub use stream::{FormatterState, FLUSH_THRESHOLD};

use crate::core::transport::{TerminalTransport, TransportError};
use crate::i18n::t;
use futures::{pin_mut, Stream, StreamExt};
use layout::Piece;
use std::time::Duration;
use stream::Utf8Carry;
use tracing::{debug, trace};

/// Default wait for a key press at a pagination pause
pub const DEFAULT_KEYPRESS_TIMEOUT: Duration = Duration::from_secs(300);

/// What one display call emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayStats {
    /// Lines written
    pub lines: usize,
    /// Pagination pauses taken
    pub pauses: usize,
}

/// Outcome of a streamed display
#[derive(Debug)]
pub struct StreamedText<E> {
    /// All text decoded from the stream, including what preceded an error
    pub text: String,
    /// Error that ended the stream early
    pub error: Option<E>,
    /// Output statistics
    pub stats: DisplayStats,
}

/// Fixed-width paginating formatter
#[derive(Debug, Clone)]
pub struct Formatter {
    width: usize,
    keypress_timeout: Duration,
}

impl Formatter {
    /// Create a formatter for a terminal `width` columns wide
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            keypress_timeout: DEFAULT_KEYPRESS_TIMEOUT,
        }
    }

    /// Set how long a pagination pause waits for a key
    #[must_use]
    pub fn keypress_timeout(mut self, timeout: Duration) -> Self {
        self.keypress_timeout = timeout;
        self
    }

    /// Column width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Show fully available text
    pub async fn display_wrapped<T>(
        &self,
        term: &mut T,
        text: &str,
        page_height: usize,
    ) -> Result<DisplayStats, TransportError>
    where
        T: TerminalTransport + ?Sized,
    {
        let mut pager = Pager::new(term, page_height, self.keypress_timeout);
        for piece in layout::layout_text(text, self.width) {
            pager.emit(piece).await?;
        }
        Ok(pager.stats)
    }

    /// Show text as it arrives from `chunks`
    ///
    /// Chunk boundaries may fall anywhere, including inside a UTF-8
    /// sequence. A chunk error stops consumption; what was received is still
    /// laid out and the error is handed back with the text.
    pub async fn display_streaming<T, S, B, E>(
        &self,
        term: &mut T,
        chunks: S,
        page_height: usize,
    ) -> Result<StreamedText<E>, TransportError>
    where
        T: TerminalTransport + ?Sized,
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
    {
        pin_mut!(chunks);
        let mut pager = Pager::new(term, page_height, self.keypress_timeout);
        let mut state = FormatterState::new(self.width);
        let mut carry = Utf8Carry::default();
        let mut text = String::new();
        let mut error = None;
        let mut pieces = Vec::new();

        while let Some(chunk) = chunks.next().await {
            let decoded = match chunk {
                Ok(bytes) => carry.push(bytes.as_ref()),
                Err(e) => {
                    debug!("text stream ended with an error after {} chars", text.len());
                    error = Some(e);
                    break;
                }
            };
            state.push_str(&decoded, &mut pieces);
            text.push_str(&decoded);
            for piece in pieces.drain(..) {
                pager.emit(piece).await?;
            }
        }

        let tail = carry.finish();
        state.push_str(&tail, &mut pieces);
        text.push_str(&tail);
        state.finish(&mut pieces);
        for piece in pieces.drain(..) {
            pager.emit(piece).await?;
        }

        Ok(StreamedText {
            text,
            error,
            stats: pager.stats,
        })
    }
}

/// Writes layout pieces and takes pagination pauses
struct Pager<'a, T: ?Sized> {
    term: &'a mut T,
    page_height: usize,
    keypress_timeout: Duration,
    lines_since_pause: usize,
    pause_due: bool,
    stats: DisplayStats,
}

impl<'a, T> Pager<'a, T>
where
    T: TerminalTransport + ?Sized,
{
    fn new(term: &'a mut T, page_height: usize, keypress_timeout: Duration) -> Self {
        Self {
            term,
            page_height,
            keypress_timeout,
            lines_since_pause: 0,
            pause_due: false,
            stats: DisplayStats::default(),
        }
    }

    async fn emit(&mut self, piece: Piece) -> Result<(), TransportError> {
        if self.pause_due {
            self.pause_due = false;
            self.pause().await?;
        }
        match piece {
            Piece::Text(text) => self.term.write(&text).await?,
            Piece::Break => {
                self.term.write_line("").await?;
                self.stats.lines += 1;
                self.lines_since_pause += 1;
                if self.page_height > 0
                    && self.term.pagination_enabled()
                    && self.lines_since_pause >= self.page_height
                {
                    self.pause_due = true;
                }
            }
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), TransportError> {
        let marker = t("format.more");
        self.term.write(&marker).await?;
        match self.term.wait_keypress(self.keypress_timeout).await? {
            Some(byte) => trace!("pagination resumed by 0x{:02x}", byte),
            None => debug!("pagination pause timed out, resuming"),
        }
        let blank = " ".repeat(marker.chars().count());
        self.term.write(&format!("\r{blank}\r")).await?;
        self.lines_since_pause = 0;
        self.stats.pauses += 1;
        Ok(())
    }
}
