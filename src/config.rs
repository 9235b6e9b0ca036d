//! Environment configuration.

use std::env;

const DEFAULT_ESCAPE_TIMEOUT_MS: u64 = 10;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Diagnostics log file. Logging stays off without it; the terminal is never a log sink.
    pub log_file: Option<String>,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: Option<String>,
    /// Mirror of every byte written to the terminal.
    pub write_log: Option<String>,
    /// How long a lone `Esc` byte waits for the rest of an escape sequence.
    pub escape_timeout_ms: u64,
    pub show_cursor: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            log_file: env_string_opt("MODAL_CONSOLE_LOG_FILE"),
            log_filter: env_string_opt("MODAL_CONSOLE_LOG"),
            write_log: env_string_opt("MODAL_CONSOLE_WRITE_LOG"),
            escape_timeout_ms: env_u64("MODAL_CONSOLE_ESC_TIMEOUT_MS")
                .unwrap_or(DEFAULT_ESCAPE_TIMEOUT_MS),
            show_cursor: env_flag("MODAL_CONSOLE_SHOW_CURSOR"),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_filter: None,
            write_log: None,
            escape_timeout_ms: DEFAULT_ESCAPE_TIMEOUT_MS,
            show_cursor: false,
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_string_opt(key).and_then(|value| value.trim().parse().ok())
}
