//! Console session: three workers sharing one terminal.
//!
//! - The log writer drains the global log queue, but only writes while no dialog is on the stack.
//! - The dialog renderer redraws the top dialog (or clears it away) whenever a redraw is requested.
//! - The input dispatcher reads key presses and forwards each one to the top dialog's queue.
//!
//! Lock order: screen, then stack, then dialog state. The stack lock is never held while
//! acquiring another lock. Both the renderer and the log writer inspect the stack while holding
//! the screen lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace};

use crate::config::EnvConfig;
use crate::core::cancel::{CancellationScope, WaitOutcome};
use crate::core::lock_unpoisoned;
use crate::core::queue::BlockingQueue;
use crate::core::terminal::{KeyReader, Terminal};
use crate::error::ConsoleError;
use crate::runtime::dialog::{Dialog, DialogOption, DialogOutcome, KeyEffect, Viewport};
use crate::runtime::message::{ConsoleMessage, Message, Severity};
use crate::runtime::screen::Screen;
use crate::runtime::stack::DialogStack;

const LOG_WRITER: &str = "console-log-writer";
const DIALOG_RENDERER: &str = "console-dialog-renderer";
const INPUT_DISPATCHER: &str = "console-input-dispatcher";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Cursor visibility while a dialog is drawn.
    pub show_cursor: bool,
}

impl From<&EnvConfig> for SessionOptions {
    fn from(config: &EnvConfig) -> Self {
        Self {
            show_cursor: config.show_cursor,
        }
    }
}

struct Shared<T: Terminal> {
    scope: CancellationScope,
    log_queue: BlockingQueue<Message>,
    stack: DialogStack,
    screen: Mutex<Screen<T>>,
    next_dialog_id: AtomicU64,
}

impl<T: Terminal> Shared<T> {
    fn lock_screen(&self) -> MutexGuard<'_, Screen<T>> {
        lock_unpoisoned(&self.screen)
    }

    fn viewport(&self) -> Viewport {
        self.lock_screen().viewport()
    }

    /// Blocks until the stack is empty, then returns the screen lock with the stack re-checked
    /// under it. `None` once the session is cancelled.
    fn screen_when_idle(&self) -> Option<MutexGuard<'_, Screen<T>>> {
        loop {
            if self.scope.wait_one(self.stack.empty_signal()) == WaitOutcome::Cancelled {
                return None;
            }
            let screen = self.lock_screen();
            if self.stack.peek_valid().is_none() {
                return Some(screen);
            }
        }
    }

    fn run_log_writer(&self) -> Result<(), ConsoleError> {
        while let Some(message) = self.log_queue.try_dequeue(&self.scope) {
            let Some(mut screen) = self.screen_when_idle() else {
                break;
            };
            screen.dismiss_dialog()?;
            screen.write_message(&message)?;
        }
        Ok(())
    }

    fn run_dialog_renderer(&self) -> Result<(), ConsoleError> {
        while self.scope.wait_one(self.stack.redraw_signal()) == WaitOutcome::Signaled {
            // Peek under the screen lock so a dismissed dialog is never painted over later log rows.
            let mut screen = self.lock_screen();
            match self.stack.peek_valid() {
                Some(dialog) => {
                    let rows = dialog.render_frame(screen.viewport());
                    trace!(dialog = dialog.id(), rows = rows.len(), "drawing dialog");
                    screen.draw_dialog(&rows)?;
                }
                None => {
                    if screen.dismiss_dialog()? {
                        trace!("dialog area cleared");
                    }
                }
            }
        }
        Ok(())
    }

    fn run_input_dispatcher<K: KeyReader>(&self, mut keys: K) -> Result<(), ConsoleError> {
        while let Some(key) = keys
            .read_key(&self.scope)
            .map_err(|source| ConsoleError::terminal("reading a key press", source))?
        {
            match self.stack.peek_valid() {
                Some(dialog) => {
                    trace!(dialog = dialog.id(), ?key, "dispatching key press");
                    dialog.keys().enqueue(key);
                }
                None => trace!(?key, "no active dialog; key press discarded"),
            }
        }
        Ok(())
    }

    fn notify(&self, message: &ConsoleMessage, severity: Severity) {
        for row in Message::rows_for(message, severity) {
            self.log_queue.enqueue(row);
        }
    }

    fn present_dialog(
        &self,
        scope: &CancellationScope,
        message: ConsoleMessage,
        options: Vec<DialogOption>,
    ) -> DialogOutcome {
        assert!(
            !options.is_empty(),
            "present_dialog requires at least one option"
        );

        let id = self.next_dialog_id.fetch_add(1, Ordering::Relaxed);
        let dialog = Arc::new(Dialog::new(id, message, options, self.viewport()));
        debug!(
            dialog = id,
            selected = dialog.selected(),
            escape = ?dialog.escape_index(),
            "presenting dialog"
        );
        self.stack.push(Arc::clone(&dialog));

        let outcome = loop {
            let Some(key) = dialog.keys().try_dequeue(scope) else {
                break DialogOutcome::Cancelled;
            };
            match dialog.handle_key(&key, self.viewport()) {
                KeyEffect::Submit(index) => break DialogOutcome::Selected(index),
                KeyEffect::Escape(index) => break DialogOutcome::Escaped(index),
                KeyEffect::Changed => self.stack.request_redraw(),
                KeyEffect::Ignored => trace!(dialog = id, ?key, "key ignored by dialog"),
            }
        };

        self.stack.invalidate(&dialog);
        self.stack.request_redraw();
        debug!(dialog = id, ?outcome, "dialog resolved");
        outcome
    }
}

/// Cloneable handle for threads that log or present dialogs.
pub struct ConsoleHandle<T: Terminal> {
    shared: Arc<Shared<T>>,
}

impl<T: Terminal> Clone for ConsoleHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Terminal> ConsoleHandle<T> {
    /// Queues the summary (and details, if any) for the log writer. Never blocks.
    ///
    /// Rows from concurrent callers land in one global FIFO order. Nothing is written while a
    /// dialog is on screen; queued rows flush in order once the last dialog is dismissed.
    pub fn notify(&self, message: impl Into<ConsoleMessage>, severity: Severity) {
        self.shared.notify(&message.into(), severity);
    }

    /// Shows a modal dialog and blocks until it is answered or the session is cancelled.
    ///
    /// The initial selection is the lowest-indexed [`OptionLevel::Recommended`] option (or 0).
    /// `Enter` returns [`DialogOutcome::Selected`]; `Esc` returns [`DialogOutcome::Escaped`] with
    /// the lowest-indexed [`OptionLevel::Escape`] option, if there is one.
    ///
    /// # Panics
    ///
    /// Panics when `options` is empty.
    ///
    /// [`OptionLevel::Recommended`]: crate::runtime::dialog::OptionLevel::Recommended
    /// [`OptionLevel::Escape`]: crate::runtime::dialog::OptionLevel::Escape
    pub fn present_dialog(
        &self,
        message: impl Into<ConsoleMessage>,
        options: Vec<DialogOption>,
    ) -> DialogOutcome {
        let scope = self.shared.scope.clone();
        self.shared.present_dialog(&scope, message.into(), options)
    }

    /// Like [`ConsoleHandle::present_dialog`], but waits on `scope`.
    ///
    /// Pass a scope from [`ConsoleHandle::child_scope`] so that session shutdown still ends
    /// the dialog; cancelling the child ends only this dialog with [`DialogOutcome::Cancelled`].
    ///
    /// # Panics
    ///
    /// Panics when `options` is empty.
    pub fn present_dialog_in(
        &self,
        scope: &CancellationScope,
        message: impl Into<ConsoleMessage>,
        options: Vec<DialogOption>,
    ) -> DialogOutcome {
        self.shared.present_dialog(scope, message.into(), options)
    }

    pub fn request_redraw(&self) {
        self.shared.stack.request_redraw();
    }

    /// Whether any valid dialog is currently on the stack.
    pub fn has_active_dialog(&self) -> bool {
        self.shared.stack.peek_valid().is_some()
    }

    /// Session scope.
    pub fn scope(&self) -> CancellationScope {
        self.shared.scope.clone()
    }

    /// Scope cancelled with the session that can also be cancelled on its own.
    pub fn child_scope(&self) -> CancellationScope {
        self.shared.scope.child()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.scope.is_cancelled()
    }
}

struct Worker {
    name: &'static str,
    join: JoinHandle<Result<(), ConsoleError>>,
}

/// Owner of the worker threads. Cancels and joins them on drop.
pub struct ConsoleSession<T: Terminal + 'static> {
    handle: ConsoleHandle<T>,
    workers: Vec<Worker>,
}

impl<T: Terminal + 'static> ConsoleSession<T> {
    pub fn start<K: KeyReader + 'static>(terminal: T, keys: K) -> Result<Self, ConsoleError> {
        Self::start_with_options(terminal, keys, SessionOptions::default())
    }

    pub fn start_with_options<K: KeyReader + 'static>(
        terminal: T,
        keys: K,
        options: SessionOptions,
    ) -> Result<Self, ConsoleError> {
        let shared = Arc::new(Shared {
            scope: CancellationScope::new(),
            log_queue: BlockingQueue::new(),
            stack: DialogStack::new(),
            screen: Mutex::new(Screen::new(terminal, options.show_cursor)),
            next_dialog_id: AtomicU64::new(1),
        });
        let mut session = Self {
            handle: ConsoleHandle {
                shared: Arc::clone(&shared),
            },
            workers: Vec::with_capacity(3),
        };

        session.spawn_worker(LOG_WRITER, |shared| shared.run_log_writer())?;
        session.spawn_worker(DIALOG_RENDERER, |shared| shared.run_dialog_renderer())?;
        session.spawn_worker(INPUT_DISPATCHER, move |shared| {
            shared.run_input_dispatcher(keys)
        })?;
        debug!("console session started");
        Ok(session)
    }

    /// On failure the partially started session is dropped, which cancels and joins the workers
    /// already running.
    fn spawn_worker<F>(&mut self, name: &'static str, body: F) -> Result<(), ConsoleError>
    where
        F: FnOnce(&Shared<T>) -> Result<(), ConsoleError> + Send + 'static,
    {
        let shared = Arc::clone(&self.handle.shared);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(worker = name, "worker started");
                let result = body(&shared);
                if let Err(err) = &result {
                    error!(worker = name, error = %err, "worker failed; cancelling session");
                    shared.scope.cancel();
                }
                debug!(worker = name, "worker stopped");
                result
            })
            .map_err(|source| ConsoleError::Spawn {
                worker: name,
                source,
            })?;
        self.workers.push(Worker { name, join });
        Ok(())
    }

    pub fn handle(&self) -> ConsoleHandle<T> {
        self.handle.clone()
    }

    pub fn notify(&self, message: impl Into<ConsoleMessage>, severity: Severity) {
        self.handle.notify(message, severity);
    }

    /// See [`ConsoleHandle::present_dialog`].
    ///
    /// # Panics
    ///
    /// Panics when `options` is empty.
    pub fn present_dialog(
        &self,
        message: impl Into<ConsoleMessage>,
        options: Vec<DialogOption>,
    ) -> DialogOutcome {
        self.handle.present_dialog(message, options)
    }

    pub fn scope(&self) -> CancellationScope {
        self.handle.scope()
    }

    /// Cancels the session scope. Workers and blocked dialogs exit at their next suspension point.
    pub fn cancel(&self) {
        self.handle.shared.scope.cancel();
    }

    /// Cancels, joins every worker, and returns the first worker error.
    pub fn shutdown(mut self) -> Result<(), ConsoleError> {
        self.join_workers()
    }

    fn join_workers(&mut self) -> Result<(), ConsoleError> {
        self.cancel();
        let mut first_error = None;
        for worker in self.workers.drain(..) {
            let result = match worker.join.join() {
                Ok(result) => result,
                Err(_) => Err(ConsoleError::WorkerPanicked {
                    worker: worker.name,
                }),
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        debug!("console session stopped");
        first_error.map_or(Ok(()), Err)
    }
}

impl<T: Terminal + 'static> Drop for ConsoleSession<T> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.join_workers();
        }
    }
}
