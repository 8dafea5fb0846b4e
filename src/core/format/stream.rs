//! Incremental reflow of text arriving in arbitrary chunks

use super::layout::{normalize_char, Layout, Piece};

/// Pending length past which a fragment with a word boundary is flushed
pub const FLUSH_THRESHOLD: usize = 10;

/// Per-display reflow state
///
/// Characters are consumed one at a time, so the pieces produced depend only
/// on the character sequence and never on how it was chunked.
#[derive(Debug, Clone)]
pub struct FormatterState {
    layout: Layout,
    pending: Vec<char>,
    last_space: Option<usize>,
    line_open: bool,
}

impl FormatterState {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            layout: Layout::new(width),
            pending: Vec::new(),
            last_space: None,
            line_open: false,
        }
    }

    /// Current column on the active output line
    pub fn column(&self) -> usize {
        self.layout.column()
    }

    /// Characters received but not yet laid out
    pub fn pending(&self) -> String {
        self.pending.iter().collect()
    }

    /// Feed decoded text
    pub(crate) fn push_str(&mut self, text: &str, out: &mut Vec<Piece>) {
        for c in text.chars().filter_map(normalize_char) {
            self.push_char(c, out);
        }
    }

    fn push_char(&mut self, c: char, out: &mut Vec<Piece>) {
        if c == '\n' {
            self.flush_all(out);
            self.layout.break_line(out);
            self.line_open = false;
            return;
        }

        self.line_open = true;
        if c.is_whitespace() {
            self.last_space = Some(self.pending.len());
        }
        self.pending.push(c);

        match self.last_space {
            Some(split) if self.pending.len() > FLUSH_THRESHOLD => {
                let head: String = self.pending[..split].iter().collect();
                self.pending.drain(..=split);
                self.last_space = None;
                self.layout.place_words(&head, out);
            }
            None if self.pending.len() > self.layout.width() => {
                if self.layout.column() > 0 {
                    self.layout.break_line(out);
                }
                let width = self.layout.width();
                let line: String = self.pending.drain(..width).collect();
                out.push(Piece::Text(line));
                self.layout.break_line(out);
            }
            _ => {}
        }
    }

    fn flush_all(&mut self, out: &mut Vec<Piece>) {
        let rest: String = self.pending.drain(..).collect();
        self.last_space = None;
        self.layout.place_words(&rest, out);
    }

    /// Lay out whatever remains once the input is exhausted
    pub(crate) fn finish(&mut self, out: &mut Vec<Piece>) {
        self.flush_all(out);
        if self.line_open {
            self.layout.break_line(out);
            self.line_open = false;
        }
    }
}

/// UTF-8 decoder tolerant of sequences split across chunks
#[derive(Debug, Default)]
pub(crate) struct Utf8Carry {
    buf: Vec<u8>,
}

impl Utf8Carry {
    /// Decode as much as possible, holding back an incomplete tail
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.buf.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.buf) {
                Ok(text) => {
                    out.push_str(text);
                    self.buf.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.buf[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.buf.drain(..valid + bad);
                        }
                        None => {
                            self.buf.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush a dangling incomplete sequence as a replacement character
    pub(crate) fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::layout::layout_text;

    fn reflow(chunks: &[&str], width: usize) -> Vec<Piece> {
        let mut state = FormatterState::new(width);
        let mut out = Vec::new();
        for chunk in chunks {
            state.push_str(chunk, &mut out);
        }
        state.finish(&mut out);
        out
    }

    fn rendered(pieces: &[Piece]) -> String {
        pieces
            .iter()
            .map(|p| match p {
                Piece::Text(s) => s.as_str(),
                Piece::Break => "\n",
            })
            .collect()
    }

    #[test]
    fn test_flushes_on_word_boundary_past_threshold() {
        let mut state = FormatterState::new(40);
        let mut out = Vec::new();
        state.push_str("hello wor", &mut out);
        assert!(out.is_empty());
        state.push_str("ld and", &mut out);
        assert_eq!(out, vec![Piece::Text("hello".to_string())]);
        assert_eq!(state.pending(), "world and");
    }

    #[test]
    fn test_flushes_on_newline() {
        let mut state = FormatterState::new(40);
        let mut out = Vec::new();
        state.push_str("hi\n", &mut out);
        assert_eq!(
            out,
            vec![Piece::Text("hi".to_string()), Piece::Break]
        );
        assert_eq!(state.column(), 0);
    }

    #[test]
    fn test_force_splits_long_fragment() {
        let mut state = FormatterState::new(8);
        let mut out = Vec::new();
        state.push_str("abcdefghij", &mut out);
        assert_eq!(rendered(&out), "abcdefgh\n");
        assert_eq!(state.pending(), "ij");
    }

    #[test]
    fn test_matches_whole_text_layout() {
        let text = "Bonjour! Je suis un assistant.\n\nVoici une liste:\n\t- un\n\t- deux \
                    supercalifragilisticexpialidocious-et-encore-plus-long\nfin   ";
        for width in [5, 10, 17, 40] {
            let whole = rendered(&layout_text(text, width));
            let chars: Vec<String> = text.chars().map(String::from).collect();
            let single: Vec<&str> = chars.iter().map(String::as_str).collect();
            assert_eq!(rendered(&reflow(&single, width)), whole, "width {width}");
            assert_eq!(rendered(&reflow(&[text], width)), whole, "width {width}");
            let (a, b) = text.split_at(23);
            assert_eq!(rendered(&reflow(&[a, b], width)), whole, "width {width}");
        }
    }

    #[test]
    fn test_trailing_blank_paragraph() {
        let text = "a\n   ";
        assert_eq!(rendered(&reflow(&[text], 40)), rendered(&layout_text(text, 40)));
    }

    #[test]
    fn test_utf8_split_sequence() {
        let bytes = "é€".as_bytes();
        let mut carry = Utf8Carry::default();
        let mut text = String::new();
        for b in bytes {
            text.push_str(&carry.push(std::slice::from_ref(b)));
        }
        text.push_str(&carry.finish());
        assert_eq!(text, "é€");
    }

    #[test]
    fn test_utf8_invalid_bytes_replaced() {
        let mut carry = Utf8Carry::default();
        let mut text = carry.push(b"a\xffb\xe2\x82");
        text.push_str(&carry.finish());
        assert_eq!(text, "a\u{FFFD}b\u{FFFD}");
    }
}
