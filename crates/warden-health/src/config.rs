//! Health monitoring configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Seconds between monitor cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Directory holding report files.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Number of report files kept.
    #[serde(default = "default_retain")]
    pub retain_reports: usize,

    /// Consecutive non-online observations that raise an alert.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u32,

    /// External health endpoint; probing is skipped when unset.
    #[serde(default)]
    pub probe_url: Option<String>,

    /// Probe timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Name prefix identifying worker processes.
    #[serde(default = "default_worker_prefix")]
    pub worker_prefix: String,

    /// Fixed names of the auxiliary services.
    #[serde(default = "default_auxiliary_services")]
    pub auxiliary_services: Vec<String>,

    /// Supervisor name of the controller's own process.
    #[serde(default = "default_controller_name")]
    pub controller_name: String,

    /// Ask the reconciliation engine for an early cycle when an alert fires.
    #[serde(default)]
    pub trigger_reconcile_on_alert: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            reports_dir: default_reports_dir(),
            retain_reports: default_retain(),
            alert_threshold: default_alert_threshold(),
            probe_url: None,
            probe_timeout_secs: default_probe_timeout(),
            worker_prefix: default_worker_prefix(),
            auxiliary_services: default_auxiliary_services(),
            controller_name: default_controller_name(),
            trigger_reconcile_on_alert: false,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

fn default_interval() -> u64 {
    30
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("./data/health-reports")
}

fn default_retain() -> usize {
    10
}

fn default_alert_threshold() -> u32 {
    3
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_worker_prefix() -> String {
    warden_types::WORKER_NAME_PREFIX.to_string()
}

fn default_auxiliary_services() -> Vec<String> {
    vec!["coordinator".to_string(), "bridge".to_string()]
}

fn default_controller_name() -> String {
    "warden".to_string()
}
