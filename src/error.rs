use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("terminal I/O error while {operation}: {source}")]
    Terminal {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn the {worker} worker thread: {source}")]
    Spawn {
        worker: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("the {worker} worker thread panicked")]
    WorkerPanicked { worker: &'static str },
}

impl ConsoleError {
    #[must_use]
    pub fn terminal(operation: &'static str, source: std::io::Error) -> Self {
        Self::Terminal { operation, source }
    }
}
