//! Display width helpers.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const TAB_WIDTH: usize = 3;

/// Columns `text` occupies on screen. Tabs count as three columns, control characters as none.
pub fn visible_width(text: &str) -> usize {
    if !text.contains('\t') {
        return UnicodeWidthStr::width(text);
    }
    text.chars()
        .map(|ch| {
            if ch == '\t' {
                TAB_WIDTH
            } else {
                UnicodeWidthChar::width(ch).unwrap_or(0)
            }
        })
        .sum()
}

/// Right-pads `text` with spaces so it spans `width` columns. Wider text is returned unchanged.
pub fn pad_to_width(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(visible_width(text));
    let mut padded = String::with_capacity(text.len() + padding);
    padded.push_str(text);
    padded.extend(std::iter::repeat(' ').take(padding));
    padded
}
