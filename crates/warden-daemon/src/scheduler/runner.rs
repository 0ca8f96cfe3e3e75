//! Loop scheduling for the reconciler and the health monitor

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use warden_health::{HealthMonitor, MonitorOutcome};

use super::reconciler::{ReconcileOutcome, Reconciler};

/// Drives both control loops until shutdown.
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    monitor: Arc<HealthMonitor>,
    reconcile_interval: Duration,
    health_interval: Duration,
    reconcile_tx: mpsc::Sender<()>,
}

impl Scheduler {
    /// Create a scheduler and the receiving end of its trigger channel.
    pub fn new(
        reconciler: Arc<Reconciler>,
        monitor: Arc<HealthMonitor>,
        reconcile_interval: Duration,
        health_interval: Duration,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        // One slot: triggers arriving while one is pending coalesce.
        let (reconcile_tx, reconcile_rx) = mpsc::channel(1);

        let scheduler = Self::with_trigger(
            reconciler,
            monitor,
            reconcile_interval,
            health_interval,
            reconcile_tx,
        );

        (Arc::new(scheduler), reconcile_rx)
    }

    /// Create a scheduler around an existing trigger channel.
    pub fn with_trigger(
        reconciler: Arc<Reconciler>,
        monitor: Arc<HealthMonitor>,
        reconcile_interval: Duration,
        health_interval: Duration,
        reconcile_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            reconciler,
            monitor,
            reconcile_interval,
            health_interval,
            reconcile_tx,
        }
    }

    /// Ask for an early reconciliation. Returns false when one is already
    /// pending.
    pub fn trigger_reconcile(&self) -> bool {
        self.reconcile_tx.try_send(()).is_ok()
    }

    /// Run both loops until `shutdown` flips. Each loop finishes its
    /// in-flight cycle before returning.
    pub async fn run(
        self: Arc<Self>,
        reconcile_rx: mpsc::Receiver<()>,
        shutdown: watch::Receiver<bool>,
    ) {
        info!(
            reconcile_interval_secs = self.reconcile_interval.as_secs(),
            health_interval_secs = self.health_interval.as_secs(),
            "Scheduler started"
        );

        let reconcile = tokio::spawn(reconcile_loop(
            self.reconciler.clone(),
            self.reconcile_interval,
            reconcile_rx,
            shutdown.clone(),
        ));
        let health = tokio::spawn(health_loop(
            self.monitor.clone(),
            self.health_interval,
            shutdown,
        ));

        let (reconcile, health) = tokio::join!(reconcile, health);
        if let Err(e) = reconcile {
            tracing::error!(error = %e, "Reconciliation loop terminated abnormally");
        }
        if let Err(e) = health {
            tracing::error!(error = %e, "Health loop terminated abnormally");
        }

        info!("Scheduler stopped");
    }

    /// Run one reconciliation cycle and one health cycle.
    pub async fn run_once(&self) -> (ReconcileOutcome, MonitorOutcome) {
        let reconcile = self.reconciler.reconcile_once().await;
        let health = self.monitor.run_cycle().await;
        (reconcile, health)
    }
}

async fn reconcile_loop(
    reconciler: Arc<Reconciler>,
    period: Duration,
    mut triggers: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
            Some(()) = triggers.recv() => debug!("Triggered reconciliation"),
        }

        reconciler.reconcile_once().await;

        // Triggers that arrived during the cycle are already served.
        while triggers.try_recv().is_ok() {}
    }

    debug!("Reconciliation loop exited");
}

async fn health_loop(
    monitor: Arc<HealthMonitor>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        monitor.run_cycle().await;
    }

    debug!("Health loop exited");
}
