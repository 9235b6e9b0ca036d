//! Modal dialog records and their key handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::core::input::{Key, KeyPress};
use crate::core::lock_unpoisoned;
use crate::core::queue::BlockingQueue;
use crate::runtime::layout::{self, StyledLine};
use crate::runtime::message::ConsoleMessage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OptionLevel {
    #[default]
    Easy,
    /// The lowest-indexed recommended option is selected initially.
    Recommended,
    /// The lowest-indexed escape option is returned immediately on `Esc`.
    Escape,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogOption {
    pub text: String,
    pub level: OptionLevel,
}

impl DialogOption {
    pub fn new(text: impl Into<String>, level: OptionLevel) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }

    pub fn easy(text: impl Into<String>) -> Self {
        Self::new(text, OptionLevel::Easy)
    }

    pub fn recommended(text: impl Into<String>) -> Self {
        Self::new(text, OptionLevel::Recommended)
    }

    pub fn escape(text: impl Into<String>) -> Self {
        Self::new(text, OptionLevel::Escape)
    }
}

/// How a presented dialog ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogOutcome {
    /// Confirmed with `Enter`.
    Selected(usize),
    /// Dismissed with `Esc`; carries the escape option's index.
    Escaped(usize),
    /// The presenting scope was cancelled before the user answered.
    Cancelled,
}

impl DialogOutcome {
    /// Chosen option index, `None` when cancelled.
    pub fn index(self) -> Option<usize> {
        match self {
            DialogOutcome::Selected(index) | DialogOutcome::Escaped(index) => Some(index),
            DialogOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(self) -> bool {
        self == DialogOutcome::Cancelled
    }
}

/// Terminal area a dialog is laid out into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub columns: u16,
    pub rows: u16,
}

impl Viewport {
    pub const fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }
}

impl From<(u16, u16)> for Viewport {
    fn from((columns, rows): (u16, u16)) -> Self {
        Self::new(columns, rows)
    }
}

/// Mutable presentation state, guarded by the dialog's lock.
#[derive(Clone, Debug)]
pub struct DialogState {
    pub message: ConsoleMessage,
    pub options: Vec<DialogOption>,
    pub selected: usize,
    pub details_expanded: bool,
    pub scroll_offset: usize,
    pub viewport: Viewport,
}

/// Result of feeding one key press to a dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyEffect {
    Submit(usize),
    Escape(usize),
    /// State changed; a redraw is needed.
    Changed,
    Ignored,
}

/// A modal dialog on the [`DialogStack`](crate::runtime::stack::DialogStack).
///
/// The presenting call is the only writer of `state`; the renderer only reads it under the lock.
pub struct Dialog {
    id: u64,
    escape_index: Option<usize>,
    state: Mutex<DialogState>,
    keys: BlockingQueue<KeyPress>,
    valid: AtomicBool,
}

impl Dialog {
    /// # Panics
    ///
    /// Panics when `options` is empty.
    pub fn new(
        id: u64,
        message: ConsoleMessage,
        options: Vec<DialogOption>,
        viewport: Viewport,
    ) -> Self {
        assert!(!options.is_empty(), "a dialog needs at least one option");

        let selected = options
            .iter()
            .position(|option| option.level == OptionLevel::Recommended)
            .unwrap_or(0);
        let escape_index = options
            .iter()
            .position(|option| option.level == OptionLevel::Escape);

        let mut state = DialogState {
            message,
            options,
            selected,
            details_expanded: false,
            scroll_offset: 0,
            viewport,
        };
        state.scroll_offset = layout::follow_selection(&state, viewport);

        Self {
            id,
            escape_index,
            state: Mutex::new(state),
            keys: BlockingQueue::new(),
            valid: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn escape_index(&self) -> Option<usize> {
        self.escape_index
    }

    pub fn selected(&self) -> usize {
        self.state().selected
    }

    pub fn state(&self) -> MutexGuard<'_, DialogState> {
        lock_unpoisoned(&self.state)
    }

    /// Private key queue fed by the input dispatcher.
    pub fn keys(&self) -> &BlockingQueue<KeyPress> {
        &self.keys
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_valid(&self) {
        self.valid.store(true, Ordering::SeqCst);
    }

    /// # Panics
    ///
    /// Panics when the dialog was already invalidated.
    pub(crate) fn invalidate(&self) {
        let was_valid = self.valid.swap(false, Ordering::SeqCst);
        assert!(was_valid, "dialog {} invalidated twice", self.id);
    }

    /// Rows to draw for `viewport`, already scrolled.
    pub fn render_frame(&self, viewport: Viewport) -> Vec<StyledLine> {
        layout::frame(&self.state(), viewport)
    }

    /// # Panics
    ///
    /// Panics when the dialog is no longer valid.
    pub(crate) fn handle_key(&self, key: &KeyPress, viewport: Viewport) -> KeyEffect {
        assert!(
            self.is_valid(),
            "key press delivered to invalidated dialog {}",
            self.id
        );

        let mut state = self.state();
        let count = state.options.len();
        let effect = match key.key {
            Key::Enter => KeyEffect::Submit(state.selected),
            Key::ArrowUp => {
                state.selected = (state.selected + count - 1) % count;
                KeyEffect::Changed
            }
            Key::ArrowDown => {
                state.selected = (state.selected + 1) % count;
                KeyEffect::Changed
            }
            Key::Space => {
                state.details_expanded = !state.details_expanded;
                KeyEffect::Changed
            }
            Key::Esc => match self.escape_index {
                Some(index) => KeyEffect::Escape(index),
                None => KeyEffect::Ignored,
            },
            _ => KeyEffect::Ignored,
        };

        if effect == KeyEffect::Changed {
            state.viewport = viewport;
            state.scroll_offset = layout::follow_selection(&state, viewport);
        }
        effect
    }
}

impl std::fmt::Debug for Dialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialog")
            .field("id", &self.id)
            .field("escape_index", &self.escape_index)
            .field("valid", &self.is_valid())
            .field("pending_keys", &self.keys.len())
            .finish()
    }
}
