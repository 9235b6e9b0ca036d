//! Concurrent console interaction engine.
//!
//! Several threads share one terminal: any thread may queue log output or present a modal
//! dialog, while a dedicated input thread feeds key presses to whichever dialog is on top.
//!
//! Invariant: while any dialog is on the stack, log output is held back; it flushes in
//! enqueue order once the last dialog is dismissed.
//!
//! # Public API Overview
//! - Start a [`ConsoleSession`] over a [`Terminal`] and a [`KeyReader`] (for a real terminal,
//!   [`ProcessTerminal::open`]).
//! - Log with [`ConsoleHandle::notify`]; ask with [`ConsoleHandle::present_dialog`].
//! - Stop with [`ConsoleSession::shutdown`] or by cancelling its [`CancellationScope`].
//! - Reuse the building blocks directly: [`BlockingQueue`], [`wrap_lines`], [`DialogStack`].

pub mod config;
pub mod error;
pub mod logging;

pub mod core;
pub mod platform;
pub mod runtime;

/// Cancellation and wait handles.
pub use crate::core::cancel::{CancellationScope, Signal, WaitOutcome};
/// Key press model and decoding.
pub use crate::core::input::{parse_key_sequence, Key, KeyPress, Modifiers};
/// Cancellable FIFO queue.
pub use crate::core::queue::BlockingQueue;
/// Terminal collaborator boundary.
pub use crate::core::terminal::{Color, CursorPosition, KeyReader, Terminal};
/// Character-exact wrapping.
pub use crate::core::text::wrap::{wrap_lines, WrapLines};

pub use crate::config::EnvConfig;
pub use crate::error::ConsoleError;

/// Dialogs, messages and the session.
pub use crate::runtime::{
    ConsoleHandle, ConsoleMessage, ConsoleSession, Dialog, DialogOption, DialogOutcome,
    DialogStack, Message, OptionLevel, SessionOptions, Severity, Viewport,
};

/// Process-backed terminal.
#[cfg(unix)]
pub use crate::platform::process_terminal::{ProcessTerminal, StdinKeyReader};
