//! Terminal collaborator boundary.
//!
//! Output and input are split so the input dispatcher can block on reads without holding the
//! lock the log writer and dialog renderer draw through.

use std::io;

use crate::core::cancel::CancellationScope;
use crate::core::input::KeyPress;

/// Abstract palette; implementations map it to real terminal colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    DefaultForeground,
    DefaultBackground,
    Red,
    Yellow,
    Green,
    White,
    Gray,
    DarkGray,
    Black,
}

/// Zero-based cell position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorPosition {
    pub column: u16,
    pub row: u16,
}

impl CursorPosition {
    pub const ORIGIN: Self = Self { column: 0, row: 0 };

    pub const fn new(column: u16, row: u16) -> Self {
        Self { column, row }
    }
}

/// Output half of the terminal.
pub trait Terminal: Send {
    /// Write text at the cursor. No implicit newline.
    fn write(&mut self, text: &str, foreground: Color, background: Color) -> io::Result<()>;

    /// Clear the visible area.
    fn clear(&mut self, background: Color) -> io::Result<()>;

    /// `(columns, rows)` of the visible area.
    fn dimensions(&self) -> (u16, u16);

    fn set_cursor_position(&mut self, position: CursorPosition, visible: bool) -> io::Result<()>;
}

/// Input half of the terminal.
pub trait KeyReader: Send {
    /// Block until the next key press.
    ///
    /// Returns `Ok(None)` once `scope` is cancelled.
    fn read_key(&mut self, scope: &CancellationScope) -> io::Result<Option<KeyPress>>;
}

impl<T: Terminal + ?Sized> Terminal for Box<T> {
    fn write(&mut self, text: &str, foreground: Color, background: Color) -> io::Result<()> {
        (**self).write(text, foreground, background)
    }

    fn clear(&mut self, background: Color) -> io::Result<()> {
        (**self).clear(background)
    }

    fn dimensions(&self) -> (u16, u16) {
        (**self).dimensions()
    }

    fn set_cursor_position(&mut self, position: CursorPosition, visible: bool) -> io::Result<()> {
        (**self).set_cursor_position(position, visible)
    }
}

impl<K: KeyReader + ?Sized> KeyReader for Box<K> {
    fn read_key(&mut self, scope: &CancellationScope) -> io::Result<Option<KeyPress>> {
        (**self).read_key(scope)
    }
}
