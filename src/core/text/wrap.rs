//! Character-exact line wrapping.
//!
//! This is not a word wrapper: rows break at exactly `width` characters and never look for
//! whitespace. Rows never contain the `'\n'` break character and are always prefixed with the
//! indent.
//!
//! Boundary skip: when a row is cut because it reached `width`, the character sitting at the
//! cut is dropped from the output. The one exception is the first cut of a row that began right
//! after an explicit `'\n'`; there the boundary character opens the next row. Existing callers
//! depend on these exact rows (`"hello\nworld"` at width 3 is `hel`, `o`, `wor`, `ld`), so the
//! skip is kept as-is.

use std::str::CharIndices;

/// Lazily wraps `text` into rows of at most `width` characters (excluding `indent`).
///
/// The returned iterator is `Clone`, so a layout can be restarted from any point. A `width` of
/// zero is treated as one.
pub fn wrap_lines<'a>(text: &'a str, width: usize, indent: &'a str) -> WrapLines<'a> {
    WrapLines {
        text,
        indent,
        width: width.max(1),
        chars: text.char_indices(),
        start: 0,
        length: 0,
        after_break: false,
        finished: false,
    }
}

#[derive(Clone, Debug)]
pub struct WrapLines<'a> {
    text: &'a str,
    indent: &'a str,
    width: usize,
    chars: CharIndices<'a>,
    /// Byte offset where the current row starts.
    start: usize,
    /// Characters in the current row.
    length: usize,
    /// The current row began right after an explicit break.
    after_break: bool,
    finished: bool,
}

impl WrapLines<'_> {
    fn row(&self, end: usize) -> String {
        let mut row = String::with_capacity(self.indent.len() + end - self.start);
        row.push_str(self.indent);
        row.push_str(&self.text[self.start..end]);
        row
    }
}

impl Iterator for WrapLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }

        while let Some((pos, ch)) = self.chars.next() {
            if ch == '\n' {
                let row = self.row(pos);
                self.start = pos + ch.len_utf8();
                self.length = 0;
                self.after_break = true;
                return Some(row);
            }

            if self.length == self.width {
                let row = self.row(pos);
                if self.after_break {
                    self.start = pos;
                    self.length = 1;
                } else {
                    self.start = pos + ch.len_utf8();
                    self.length = 0;
                }
                self.after_break = false;
                return Some(row);
            }

            self.length += 1;
        }

        self.finished = true;
        if self.length > 0 {
            Some(self.row(self.text.len()))
        } else {
            None
        }
    }
}

impl std::iter::FusedIterator for WrapLines<'_> {}
