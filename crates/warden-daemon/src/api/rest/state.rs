//! Application state for API handlers

use std::sync::Arc;

use warden_health::HealthMonitor;

use crate::scheduler::{Reconciler, Scheduler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Read access to the actual-state map
    pub reconciler: Arc<Reconciler>,

    /// Health monitor, for its report store
    pub monitor: Arc<HealthMonitor>,

    /// Trigger channel owner
    pub scheduler: Arc<Scheduler>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        reconciler: Arc<Reconciler>,
        monitor: Arc<HealthMonitor>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            reconciler,
            monitor,
            scheduler,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Uptime in whole seconds
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}
