//! Text helpers (character-exact wrapping, display width).
//!
//! These helpers are pure (string in/rows out) so the dialog layout can be computed and tested
//! without a terminal.

pub mod width;
pub mod wrap;
