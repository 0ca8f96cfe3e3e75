//! Error types for warden-state crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or saving state snapshots.
#[derive(Debug, Error)]
pub enum StateError {
    /// Filesystem error.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file exists but cannot be parsed.
    #[error("corrupt snapshot {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Snapshot could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;
