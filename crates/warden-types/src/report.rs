//! Health report produced by each Health Monitor cycle
//!
//! Reports are immutable once written.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProcessStatus;

/// Fleet-level verdict for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

/// Worker tallies for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub total: usize,
    pub online: usize,
    pub unhealthy: usize,
}

/// Status of a named non-worker process; `None` means not found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: Option<ProcessStatus>,
}

impl ServiceStatus {
    pub fn is_online(&self) -> bool {
        self.status.map(|s| s.is_online()).unwrap_or(false)
    }
}

/// Result of the external HTTP health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub url: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// A worker observed non-online during the cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerIssue {
    pub instance_name: String,
    pub status: ProcessStatus,
    pub consecutive_failures: u32,
}

/// One Health Monitor cycle's findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub worker_counts: WorkerCounts,
    pub manager_status: ServiceStatus,
    pub auxiliary_service_statuses: BTreeMap<String, ServiceStatus>,
    /// Absent when no probe URL is configured
    pub http_probe: Option<ProbeOutcome>,
    pub unhealthy_workers: Vec<WorkerIssue>,
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.overall_status == OverallStatus::Healthy
    }
}
