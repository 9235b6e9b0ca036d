//! Platform-specific terminal integrations.

pub mod key_decoder;
#[cfg(unix)]
pub mod process_terminal;

#[cfg(unix)]
pub use process_terminal::{ProcessTerminal, StdinKeyReader};
