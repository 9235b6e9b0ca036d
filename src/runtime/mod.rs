//! Runtime orchestration: dialogs, the dialog stack, and the console session.

pub mod dialog;
pub mod layout;
pub mod message;
pub(crate) mod screen;
pub mod session;
pub mod stack;

pub use dialog::{Dialog, DialogOption, DialogOutcome, DialogState, OptionLevel, Viewport};
pub use message::{ConsoleMessage, Message, Severity};
pub use session::{ConsoleHandle, ConsoleSession, SessionOptions};
pub use stack::DialogStack;
