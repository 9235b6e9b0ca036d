//! LIFO stack of modal dialogs.
//!
//! Only the first valid entry from the top is visible and receives keys. Invalid entries are
//! removed lazily by [`DialogStack::trim`], which every read goes through.

use std::sync::{Arc, Mutex};

use crate::core::cancel::Signal;
use crate::core::lock_unpoisoned;
use crate::runtime::dialog::Dialog;

pub struct DialogStack {
    entries: Mutex<Vec<Arc<Dialog>>>,
    redraw: Signal,
    /// Set while the stack is empty; reset by `push`, set again by the trim that empties it.
    empty: Signal,
}

impl DialogStack {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            redraw: Signal::auto_reset(),
            empty: Signal::manual_reset(true),
        }
    }

    /// Marks `dialog` valid, places it on top, and requests a redraw.
    pub fn push(&self, dialog: Arc<Dialog>) {
        {
            let mut entries = lock_unpoisoned(&self.entries);
            dialog.mark_valid();
            entries.push(dialog);
            self.empty.reset();
        }
        self.redraw.set();
    }

    /// Marks `dialog` invalid. It stays on the stack until a trim reaches it.
    ///
    /// # Panics
    ///
    /// Panics when `dialog` was already invalidated.
    pub fn invalidate(&self, dialog: &Dialog) {
        dialog.invalidate();
    }

    /// Pops invalid entries off the top. Sets the empty signal when this trim emptied the stack.
    pub fn trim(&self) {
        let mut entries = lock_unpoisoned(&self.entries);
        Self::trim_locked(&mut entries, &self.empty);
    }

    fn trim_locked(entries: &mut Vec<Arc<Dialog>>, empty: &Signal) {
        let mut popped = 0;
        while entries.last().is_some_and(|top| !top.is_valid()) {
            entries.pop();
            popped += 1;
        }
        if popped > 0 && entries.is_empty() {
            empty.set();
        }
    }

    /// Trims, then returns the top dialog.
    pub fn peek_valid(&self) -> Option<Arc<Dialog>> {
        let mut entries = lock_unpoisoned(&self.entries);
        Self::trim_locked(&mut entries, &self.empty);
        entries.last().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.peek_valid().is_none()
    }

    /// Entries currently held, including invalid ones not yet trimmed.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn request_redraw(&self) {
        self.redraw.set();
    }

    /// Auto-reset signal consumed by the dialog renderer.
    pub fn redraw_signal(&self) -> &Signal {
        &self.redraw
    }

    /// Manual-reset signal observed by the log writer.
    pub fn empty_signal(&self) -> &Signal {
        &self.empty
    }
}

impl Default for DialogStack {
    fn default() -> Self {
        Self::new()
    }
}
