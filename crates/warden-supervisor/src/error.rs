//! Error types for warden-supervisor

use thiserror::Error;

/// Errors raised while driving the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The supervisor command could not be spawned.
    #[error("failed to run supervisor command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The supervisor command exited unsuccessfully.
    #[error("supervisor command `{command}` failed (exit code {code:?}): {message}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    /// The supervisor command did not finish in time.
    #[error("supervisor command `{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    /// The supervisor's output could not be understood.
    #[error("unparseable supervisor output: {0}")]
    Parse(String),
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
