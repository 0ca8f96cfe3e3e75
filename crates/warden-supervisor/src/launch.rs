//! Launch parameters handed to the supervisor

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How to launch a worker process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Entry point executed by the supervisor.
    pub script: PathBuf,

    /// Interpreter for the script (e.g. `node`); supervisor default when unset.
    pub interpreter: Option<String>,

    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Arguments passed to the script.
    pub args: Vec<String>,

    /// Environment for the process. Identity parameters only.
    pub env: BTreeMap<String, String>,

    /// Memory ceiling after which the supervisor restarts the process (e.g. `500M`).
    pub max_memory_restart: Option<String>,

    /// Restarts the supervisor attempts on its own before giving up.
    pub max_restarts: Option<u32>,

    /// Stdout log file.
    pub out_log: Option<PathBuf>,

    /// Stderr log file.
    pub err_log: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}
