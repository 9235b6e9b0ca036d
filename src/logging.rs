//! Diagnostics logging.
//!
//! The session owns the terminal, so diagnostics go to a file named by
//! `MODAL_CONSOLE_LOG_FILE` and never to stdout/stderr.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

const DEFAULT_FILTER: &str = "info";

/// Installs a global file-backed `tracing` subscriber when a log file is configured.
///
/// Returns `Ok(false)` when no log file is configured or another subscriber is already installed.
pub fn init(config: &EnvConfig) -> io::Result<bool> {
    let Some(path) = config.log_file.as_deref() else {
        return Ok(false);
    };
    init_file(Path::new(path), config.log_filter.as_deref())
}

/// Installs a global subscriber appending to `path`, filtered by `filter` (default `info`).
pub fn init_file(path: &Path, filter: Option<&str>) -> io::Result<bool> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .is_ok();
    Ok(installed)
}

fn env_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
