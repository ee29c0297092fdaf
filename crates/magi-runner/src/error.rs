//! Error types for magi-runner

use thiserror::Error;

/// Runner error type
#[derive(Debug, Error)]
pub enum Error {
    /// The pseudo-terminal could not be opened or the command could not be spawned
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// Options failed validation before spawning
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A chunk of output could not be processed (predicate or callback failure)
    #[error("processing error: {0}")]
    Processing(String),

    /// The process exited with a non-zero status that nothing else explains
    #[error("process exited with code {code}")]
    ProcessExit {
        /// Exit code reported by the OS (-1 when killed by a signal)
        code: i32,
    },

    /// The session manager no longer accepts new sessions
    #[error("session manager is shutting down")]
    ShuttingDown,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
