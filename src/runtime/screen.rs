//! Terminal guard shared by the log writer and the dialog renderer.

use crate::core::terminal::{Color, CursorPosition, Terminal};
use crate::error::ConsoleError;
use crate::runtime::dialog::Viewport;
use crate::runtime::layout::StyledLine;
use crate::runtime::message::Message;

/// Owns the terminal and remembers whether a dialog is currently painted on it.
///
/// Whichever worker first finds the stack empty while a dialog is still painted clears the
/// screen, so a log row written afterwards is never wiped by a late renderer pass.
pub(crate) struct Screen<T: Terminal> {
    terminal: T,
    dialog_drawn: bool,
    show_cursor: bool,
}

impl<T: Terminal> Screen<T> {
    pub(crate) fn new(terminal: T, show_cursor: bool) -> Self {
        Self {
            terminal,
            dialog_drawn: false,
            show_cursor,
        }
    }

    pub(crate) fn viewport(&self) -> Viewport {
        Viewport::from(self.terminal.dimensions())
    }

    pub(crate) fn write_message(&mut self, message: &Message) -> Result<(), ConsoleError> {
        self.terminal
            .write(&message.text, message.foreground, message.background)
            .and_then(|()| {
                self.terminal
                    .write("\n", Color::DefaultForeground, Color::DefaultBackground)
            })
            .map_err(|source| ConsoleError::terminal("writing a log message", source))
    }

    pub(crate) fn draw_dialog(&mut self, rows: &[StyledLine]) -> Result<(), ConsoleError> {
        self.terminal
            .clear(Color::DefaultBackground)
            .map_err(|source| ConsoleError::terminal("clearing the screen", source))?;
        self.dialog_drawn = true;

        for (row, line) in rows.iter().enumerate() {
            let row = u16::try_from(row).unwrap_or(u16::MAX);
            self.terminal
                .set_cursor_position(CursorPosition::new(0, row), self.show_cursor)
                .map_err(|source| ConsoleError::terminal("positioning the cursor", source))?;
            self.terminal
                .write(&line.text, line.foreground, line.background)
                .map_err(|source| ConsoleError::terminal("drawing a dialog row", source))?;
        }
        Ok(())
    }

    /// Clears a painted dialog, if any. Returns whether the screen was cleared.
    pub(crate) fn dismiss_dialog(&mut self) -> Result<bool, ConsoleError> {
        if !self.dialog_drawn {
            return Ok(false);
        }
        self.dialog_drawn = false;
        self.terminal
            .clear(Color::DefaultBackground)
            .map_err(|source| ConsoleError::terminal("clearing the screen", source))?;
        self.terminal
            .set_cursor_position(CursorPosition::ORIGIN, true)
            .map_err(|source| ConsoleError::terminal("positioning the cursor", source))?;
        Ok(true)
    }
}
