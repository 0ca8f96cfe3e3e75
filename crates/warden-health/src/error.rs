//! Error types for warden-health crate.

use std::path::PathBuf;

use thiserror::Error;
use warden_supervisor::SupervisorError;

/// Errors that can occur during health monitoring.
#[derive(Debug, Error)]
pub enum HealthError {
    /// The supervisor listing failed.
    #[error("supervisor listing failed: {0}")]
    Supervisor(#[from] SupervisorError),

    /// Report file IO failed.
    #[error("report io error on {path}: {source}")]
    ReportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report could not be (de)serialized.
    #[error("report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client could not be built.
    #[error("probe client error: {0}")]
    ProbeClient(String),
}

impl HealthError {
    pub(crate) fn report_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReportIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type for health operations.
pub type HealthResult<T> = Result<T, HealthError>;
