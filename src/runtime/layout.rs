//! Dialog row layout.
//!
//! Rows, top to bottom: the wrapped summary, a details toggle row (plus the wrapped details when
//! expanded), a blank separator, then every option. The selected option is drawn inverted and
//! padded to the full width.

use std::ops::Range;

use crate::core::terminal::Color;
use crate::core::text::width::pad_to_width;
use crate::core::text::wrap::wrap_lines;
use crate::runtime::dialog::{DialogState, Viewport};

const DETAILS_INDENT: &str = "  ";
const OPTION_INDENT: &str = "  ";
const DETAILS_COLLAPSED: &str = "[+] details";
const DETAILS_EXPANDED: &str = "[-] details";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledLine {
    pub text: String,
    pub foreground: Color,
    pub background: Color,
}

impl StyledLine {
    fn plain(text: impl Into<String>) -> Self {
        Self::colored(text, Color::DefaultForeground)
    }

    fn colored(text: impl Into<String>, foreground: Color) -> Self {
        Self {
            text: text.into(),
            foreground,
            background: Color::DefaultBackground,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DialogLayout {
    pub lines: Vec<StyledLine>,
    /// Row range occupied by each option, indexed like the options.
    pub option_rows: Vec<Range<usize>>,
}

/// Lays out every row of the dialog for a terminal `columns` wide.
pub fn layout_dialog(state: &DialogState, columns: u16) -> DialogLayout {
    let width = usize::from(columns).max(1);
    let mut lines = Vec::new();

    lines.extend(wrap_lines(&state.message.summary, width, "").map(StyledLine::plain));

    if let Some(details) = state.message.details() {
        let toggle = if state.details_expanded {
            DETAILS_EXPANDED
        } else {
            DETAILS_COLLAPSED
        };
        lines.push(StyledLine::colored(toggle, Color::DarkGray));
        if state.details_expanded {
            let inner = width.saturating_sub(DETAILS_INDENT.len());
            lines.extend(
                wrap_lines(details, inner, DETAILS_INDENT)
                    .map(|row| StyledLine::colored(row, Color::Gray)),
            );
        }
    }

    lines.push(StyledLine::plain(""));

    let inner = width.saturating_sub(OPTION_INDENT.len());
    let mut option_rows = Vec::with_capacity(state.options.len());
    for (index, option) in state.options.iter().enumerate() {
        let first = lines.len();
        let mut rows: Vec<String> = wrap_lines(&option.text, inner, OPTION_INDENT).collect();
        if rows.is_empty() {
            rows.push(OPTION_INDENT.to_string());
        }

        let selected = index == state.selected;
        for row in rows {
            if selected {
                lines.push(StyledLine {
                    text: pad_to_width(&row, width),
                    foreground: Color::Black,
                    background: Color::White,
                });
            } else {
                lines.push(StyledLine::plain(row));
            }
        }
        option_rows.push(first..lines.len());
    }

    DialogLayout { lines, option_rows }
}

/// Scroll offset that keeps the selected option on screen, moving `state.scroll_offset` as
/// little as possible. The top of an option taller than the viewport wins.
pub fn follow_selection(state: &DialogState, viewport: Viewport) -> usize {
    let layout = layout_dialog(state, viewport.columns);
    scroll_for(&layout, state.selected, state.scroll_offset, viewport.rows)
}

fn scroll_for(layout: &DialogLayout, selected: usize, current: usize, rows: u16) -> usize {
    let rows = usize::from(rows).max(1);
    let mut offset = current;
    if let Some(range) = layout.option_rows.get(selected) {
        if range.end > offset + rows {
            offset = range.end - rows;
        }
        if range.start < offset {
            offset = range.start;
        }
    }
    offset.min(layout.lines.len().saturating_sub(rows))
}

/// Visible rows for `viewport`, scrolled so the selection stays on screen.
pub fn frame(state: &DialogState, viewport: Viewport) -> Vec<StyledLine> {
    let layout = layout_dialog(state, viewport.columns);
    let offset = scroll_for(&layout, state.selected, state.scroll_offset, viewport.rows);
    let end = (offset + usize::from(viewport.rows).max(1)).min(layout.lines.len());
    layout.lines[offset..end].to_vec()
}
