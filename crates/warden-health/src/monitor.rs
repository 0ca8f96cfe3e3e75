//! Health monitor for the worker fleet.
//!
//! Runs independently of the reconciliation engine and only ever reads from
//! the supervisor.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};
use warden_supervisor::ProcessSupervisor;
use warden_types::{
    HealthReport, OverallStatus, ProcessInfo, ServiceStatus, WorkerCounts, WorkerIssue,
};

use crate::config::HealthConfig;
use crate::error::{HealthError, HealthResult};
use crate::failures::{FailureAlert, FailureTracker};
use crate::probe::{HealthProbe, HttpProbe};
use crate::reports::ReportStore;

/// Receiver of worker alerts beyond the log line.
pub trait AlertSink: Send + Sync {
    fn alert(&self, alert: &FailureAlert);
}

/// A reconcile trigger channel. Full channels drop the alert, since a
/// pending trigger already covers it.
impl AlertSink for mpsc::Sender<()> {
    fn alert(&self, alert: &FailureAlert) {
        if self.try_send(()).is_ok() {
            debug!(instance = %alert.instance_name, "Requested early reconciliation");
        }
    }
}

/// What one monitor cycle produced.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub report: HealthReport,
    pub alerts: Vec<FailureAlert>,
    /// `None` when the report could not be written.
    pub report_path: Option<PathBuf>,
}

/// Result of asking the monitor to run.
#[derive(Debug, Clone)]
pub enum MonitorOutcome {
    /// A cycle was already in flight.
    Skipped,
    Completed(Box<CycleSummary>),
}

/// Health monitor for the worker fleet.
pub struct HealthMonitor {
    config: HealthConfig,
    supervisor: Arc<dyn ProcessSupervisor>,
    probe: Option<Arc<dyn HealthProbe>>,
    reports: ReportStore,
    failures: Mutex<FailureTracker>,
    alert_sink: Option<Arc<dyn AlertSink>>,
}

impl HealthMonitor {
    /// Create a monitor; builds an HTTP probe when a probe URL is configured.
    pub fn new(config: HealthConfig, supervisor: Arc<dyn ProcessSupervisor>) -> HealthResult<Self> {
        let probe: Option<Arc<dyn HealthProbe>> = match &config.probe_url {
            Some(url) => Some(Arc::new(HttpProbe::new(url.clone(), config.probe_timeout())?)),
            None => None,
        };

        Ok(Self {
            reports: ReportStore::new(config.reports_dir.clone(), config.retain_reports),
            failures: Mutex::new(FailureTracker::new(config.alert_threshold)),
            config,
            supervisor,
            probe,
            alert_sink: None,
        })
    }

    /// Replace the probe.
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Forward alerts to a sink when `trigger_reconcile_on_alert` is set.
    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    /// Run one monitor cycle unless one is already running.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> MonitorOutcome {
        let Ok(mut failures) = self.failures.try_lock() else {
            debug!("Health cycle already in flight, skipping");
            return MonitorOutcome::Skipped;
        };

        let mut issues = Vec::new();
        let processes = match self.supervisor.list().await {
            Ok(processes) => Some(processes),
            Err(e) => {
                let e = HealthError::from(e);
                warn!(error = %e, "Failed to list processes");
                issues.push(e.to_string());
                None
            }
        };

        let mut worker_counts = WorkerCounts::default();
        let mut unhealthy_workers = Vec::new();
        let mut alerts = Vec::new();

        if let Some(processes) = &processes {
            let workers: Vec<&ProcessInfo> = processes
                .iter()
                .filter(|p| p.name.starts_with(&self.config.worker_prefix))
                .collect();

            for worker in &workers {
                worker_counts.total += 1;
                let online = worker.status.is_online();
                if let Some(alert) = failures.observe(&worker.name, online) {
                    error!(
                        alert = true,
                        instance = %alert.instance_name,
                        consecutive_failures = alert.consecutive_failures,
                        status = %worker.status,
                        "Worker unhealthy for consecutive health checks"
                    );
                    if self.config.trigger_reconcile_on_alert {
                        if let Some(sink) = &self.alert_sink {
                            sink.alert(&alert);
                        }
                    }
                    alerts.push(alert);
                }

                if online {
                    worker_counts.online += 1;
                } else {
                    worker_counts.unhealthy += 1;
                    unhealthy_workers.push(WorkerIssue {
                        instance_name: worker.name.clone(),
                        status: worker.status,
                        consecutive_failures: failures.count(&worker.name),
                    });
                    issues.push(format!("worker {} is {}", worker.name, worker.status));
                }
            }

            let seen: HashSet<String> = workers.iter().map(|w| w.name.clone()).collect();
            failures.retain_seen(&seen);
        }

        let lookup = |name: &str| ServiceStatus {
            name: name.to_string(),
            status: processes
                .as_ref()
                .and_then(|ps| ps.iter().find(|p| p.name == name))
                .map(|p| p.status),
        };

        let mut auxiliary_service_statuses = BTreeMap::new();
        for name in &self.config.auxiliary_services {
            let status = lookup(name);
            if processes.is_some() && !status.is_online() {
                issues.push(match status.status {
                    Some(s) => format!("auxiliary service {} is {}", name, s),
                    None => format!("auxiliary service {} is not running", name),
                });
            }
            auxiliary_service_statuses.insert(name.clone(), status);
        }

        let manager_status = lookup(&self.config.controller_name);

        let http_probe = match &self.probe {
            Some(probe) => {
                let outcome = probe.probe().await;
                if !outcome.success {
                    issues.push(format!(
                        "health probe {} failed: {}",
                        outcome.url,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                Some(outcome)
            }
            None => None,
        };

        let degraded = processes.is_none()
            || worker_counts.unhealthy > 0
            || auxiliary_service_statuses.values().any(|s| !s.is_online())
            || http_probe.as_ref().map(|p| !p.success).unwrap_or(false);

        let report = HealthReport {
            timestamp: Utc::now(),
            overall_status: if degraded {
                OverallStatus::Degraded
            } else {
                OverallStatus::Healthy
            },
            worker_counts,
            manager_status,
            auxiliary_service_statuses,
            http_probe,
            unhealthy_workers,
            issues,
        };

        let report_path = match self.reports.write(&report).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Failed to persist health report");
                None
            }
        };

        if report.is_healthy() {
            info!(
                workers = report.worker_counts.total,
                online = report.worker_counts.online,
                "Health check passed"
            );
        } else {
            warn!(
                workers = report.worker_counts.total,
                unhealthy = report.worker_counts.unhealthy,
                issues = report.issues.len(),
                "Fleet degraded"
            );
        }

        MonitorOutcome::Completed(Box::new(CycleSummary {
            report,
            alerts,
            report_path,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warden_supervisor::InMemorySupervisor;
    use warden_types::{ProbeOutcome, ProcessStatus};

    struct FixedProbe(bool);

    #[async_trait]
    impl HealthProbe for FixedProbe {
        async fn probe(&self) -> ProbeOutcome {
            ProbeOutcome {
                url: "http://coordinator/health".to_string(),
                success: self.0,
                status_code: Some(if self.0 { 200 } else { 500 }),
                latency_ms: 1,
                error: (!self.0).then(|| "unexpected status 500".to_string()),
            }
        }
    }

    fn healthy_fleet() -> Arc<InMemorySupervisor> {
        let supervisor = Arc::new(InMemorySupervisor::new());
        supervisor.insert("worker-t1-r1", ProcessStatus::Online);
        supervisor.insert("worker-t2-r2", ProcessStatus::Online);
        supervisor.insert("coordinator", ProcessStatus::Online);
        supervisor.insert("bridge", ProcessStatus::Online);
        supervisor.insert("warden", ProcessStatus::Online);
        supervisor
    }

    fn monitor(dir: &std::path::Path, supervisor: Arc<InMemorySupervisor>) -> HealthMonitor {
        let config = HealthConfig {
            reports_dir: dir.to_path_buf(),
            ..Default::default()
        };
        HealthMonitor::new(config, supervisor)
            .unwrap()
            .with_probe(Arc::new(FixedProbe(true)))
    }

    fn summary(outcome: MonitorOutcome) -> CycleSummary {
        match outcome {
            MonitorOutcome::Completed(summary) => *summary,
            MonitorOutcome::Skipped => panic!("cycle unexpectedly skipped"),
        }
    }

    #[tokio::test]
    async fn test_healthy_fleet_report() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path(), healthy_fleet());

        let summary = summary(monitor.run_cycle().await);

        assert_eq!(summary.report.overall_status, OverallStatus::Healthy);
        assert_eq!(summary.report.worker_counts.total, 2);
        assert_eq!(summary.report.worker_counts.online, 2);
        assert_eq!(summary.report.manager_status.status, Some(ProcessStatus::Online));
        assert!(summary.report.issues.is_empty());
        assert!(summary.report_path.unwrap().exists());
    }

    #[tokio::test]
    async fn test_alert_after_three_consecutive_failures() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = healthy_fleet();
        supervisor.set_status("worker-t1-r1", ProcessStatus::Errored);
        let monitor = monitor(dir.path(), supervisor);

        let first = summary(monitor.run_cycle().await);
        let second = summary(monitor.run_cycle().await);
        assert!(first.alerts.is_empty());
        assert!(second.alerts.is_empty());
        assert_eq!(second.report.overall_status, OverallStatus::Degraded);

        let third = summary(monitor.run_cycle().await);
        assert_eq!(third.alerts.len(), 1);
        assert_eq!(third.alerts[0].instance_name, "worker-t1-r1");
        assert_eq!(third.report.unhealthy_workers[0].consecutive_failures, 3);

        let fourth = summary(monitor.run_cycle().await);
        assert!(fourth.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_recovery_resets_failure_count() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = healthy_fleet();
        let monitor = monitor(dir.path(), supervisor.clone());

        supervisor.set_status("worker-t1-r1", ProcessStatus::Stopped);
        monitor.run_cycle().await;
        monitor.run_cycle().await;
        supervisor.set_status("worker-t1-r1", ProcessStatus::Online);
        monitor.run_cycle().await;
        supervisor.set_status("worker-t1-r1", ProcessStatus::Stopped);
        monitor.run_cycle().await;

        let summary = summary(monitor.run_cycle().await);
        assert!(summary.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_auxiliary_service_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = healthy_fleet();
        supervisor.remove("bridge");
        let monitor = monitor(dir.path(), supervisor);

        let summary = summary(monitor.run_cycle().await);

        assert_eq!(summary.report.overall_status, OverallStatus::Degraded);
        assert_eq!(summary.report.auxiliary_service_statuses["bridge"].status, None);
        assert_eq!(summary.report.worker_counts.unhealthy, 0);
    }

    #[tokio::test]
    async fn test_failed_probe_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path(), healthy_fleet()).with_probe(Arc::new(FixedProbe(false)));

        let summary = summary(monitor.run_cycle().await);

        assert_eq!(summary.report.overall_status, OverallStatus::Degraded);
        assert!(!summary.report.http_probe.unwrap().success);
    }

    #[tokio::test]
    async fn test_listing_failure_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = healthy_fleet();
        supervisor.fail_list(true);
        let monitor = monitor(dir.path(), supervisor);

        let summary = summary(monitor.run_cycle().await);

        assert_eq!(summary.report.overall_status, OverallStatus::Degraded);
        assert!(summary.report.issues[0].contains("supervisor listing failed"));
        assert!(summary.report_path.is_some());
    }

    #[tokio::test]
    async fn test_alert_triggers_reconcile_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = healthy_fleet();
        supervisor.set_status("worker-t2-r2", ProcessStatus::Errored);
        let (tx, mut rx) = mpsc::channel(1);
        let config = HealthConfig {
            reports_dir: dir.path().to_path_buf(),
            alert_threshold: 1,
            trigger_reconcile_on_alert: true,
            ..Default::default()
        };
        let monitor = HealthMonitor::new(config, supervisor)
            .unwrap()
            .with_alert_sink(Arc::new(tx));

        summary(monitor.run_cycle().await);

        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_reports_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path(), healthy_fleet());

        for _ in 0..12 {
            monitor.run_cycle().await;
        }

        assert_eq!(monitor.reports().count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_skipped_while_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path(), healthy_fleet());
        let _guard = monitor.failures.lock().await;

        assert!(matches!(monitor.run_cycle().await, MonitorOutcome::Skipped));
        assert!(monitor.reports().latest().await.unwrap().is_none());
    }
}
