//! Greedy fixed-width word layout shared by every formatter entry point

/// One unit of terminal output produced by the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    /// Text continuing the current line
    Text(String),
    /// End of the current line
    Break,
}

/// Cursor state of the line being laid out
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    width: usize,
    column: usize,
}

impl Layout {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            column: 0,
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn column(&self) -> usize {
        self.column
    }

    /// Place one whitespace-free word, wrapping or hard-splitting as needed
    pub(crate) fn place_word(&mut self, word: &str, out: &mut Vec<Piece>) {
        let len = word.chars().count();
        if len == 0 {
            return;
        }
        if self.column > 0 {
            if self.column + 1 + len <= self.width {
                out.push(Piece::Text(format!(" {word}")));
                self.column += 1 + len;
                return;
            }
            self.break_line(out);
        }

        let chars: Vec<char> = word.chars().collect();
        let mut rest = chars.as_slice();
        while rest.len() > self.width {
            let (line, tail) = rest.split_at(self.width);
            out.push(Piece::Text(line.iter().collect()));
            out.push(Piece::Break);
            rest = tail;
        }
        out.push(Piece::Text(rest.iter().collect()));
        self.column = rest.len();
    }

    /// Place every word of `text`
    pub(crate) fn place_words(&mut self, text: &str, out: &mut Vec<Piece>) {
        for word in text.split_whitespace() {
            self.place_word(word, out);
        }
    }

    /// End the current line
    pub(crate) fn break_line(&mut self, out: &mut Vec<Piece>) {
        out.push(Piece::Break);
        self.column = 0;
    }
}

/// Map one source character to what the layout sees, `None` to drop it
pub(crate) fn normalize_char(c: char) -> Option<char> {
    match c {
        '\r' => None,
        '\t' => Some(' '),
        other => Some(other),
    }
}

/// Lay out fully available text: one paragraph per source line
pub(crate) fn layout_text(text: &str, width: usize) -> Vec<Piece> {
    let text: String = text.chars().filter_map(normalize_char).collect();
    let mut layout = Layout::new(width);
    let mut out = Vec::new();
    for paragraph in text.lines() {
        layout.place_words(paragraph, &mut out);
        layout.break_line(&mut out);
    }
    out
}

/// Wrap text to `width` columns without a terminal
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for piece in layout_text(text, width) {
        match piece {
            Piece::Text(s) => current.push_str(&s),
            Piece::Break => lines.push(std::mem::take(&mut current)),
        }
    }
    lines
}
