//! What the process supervisor reports about named processes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supervisor-reported process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Online,
    Launching,
    Stopping,
    Stopped,
    Errored,
    WaitingRestart,
    OneLaunchStatus,
    Unknown,
}

impl ProcessStatus {
    /// Map a status string from the supervisor; anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "online" => Self::Online,
            "launching" => Self::Launching,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "errored" => Self::Errored,
            "waiting restart" | "waiting_restart" => Self::WaitingRestart,
            "one-launch-status" | "one_launch_status" => Self::OneLaunchStatus,
            _ => Self::Unknown,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// States the reconciliation engine heals with a stop-then-start.
    pub fn needs_restart(&self) -> bool {
        matches!(self, Self::Errored | Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Launching => "launching",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
            Self::WaitingRestart => "waiting_restart",
            Self::OneLaunchStatus => "one_launch_status",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a supervisor listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub status: ProcessStatus,
    pub pid: Option<u32>,
    /// Restarts performed by the supervisor itself
    pub restarts: u32,
    pub memory_bytes: Option<u64>,
    pub cpu_percent: Option<f32>,
}

impl ProcessInfo {
    pub fn new(name: impl Into<String>, status: ProcessStatus) -> Self {
        Self {
            name: name.into(),
            status,
            pid: None,
            restarts: 0,
            memory_bytes: None,
            cpu_percent: None,
        }
    }
}
