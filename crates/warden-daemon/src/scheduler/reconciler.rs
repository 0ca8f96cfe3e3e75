//! Reconciliation engine
//!
//! Converges the supervisor's worker set with the desired state. The
//! actual-state map is owned here and mutated only while the cycle lock is
//! held; readers get cloned snapshots.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use warden_state::{StateResult, StateStore};
use warden_supervisor::{ProcessSupervisor, SupervisorResult};
use warden_types::{
    dedupe_by_tenant, ActualStateMap, DesiredStateEntry, ManagedInstance, ProcessStatus, TenantId,
};

use crate::launch::WorkerTemplate;
use crate::provider::DesiredStateProvider;

/// Counts of the actions one cycle took.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub started: usize,
    pub switched: usize,
    pub stopped: usize,
    pub healed: usize,
    pub failed: usize,
}

impl ReconcileReport {
    /// Whether the cycle did nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of asking for a reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Another cycle was in flight.
    Skipped,
    /// The desired state could not be fetched; nothing changed.
    Aborted(String),
    Completed(ReconcileReport),
}

/// Reconciliation engine
pub struct Reconciler {
    provider: Arc<dyn DesiredStateProvider>,
    supervisor: Arc<dyn ProcessSupervisor>,
    store: Arc<dyn StateStore>,
    template: WorkerTemplate,
    skip_heal_for_touched: bool,
    /// Authoritative map; the lock doubles as the single-flight guard.
    actual: Mutex<ActualStateMap>,
    /// Copy of `actual` as of the last structural change.
    published: RwLock<ActualStateMap>,
}

impl Reconciler {
    pub fn new(
        provider: Arc<dyn DesiredStateProvider>,
        supervisor: Arc<dyn ProcessSupervisor>,
        store: Arc<dyn StateStore>,
        template: WorkerTemplate,
    ) -> Self {
        Self {
            provider,
            supervisor,
            store,
            template,
            skip_heal_for_touched: true,
            actual: Mutex::new(ActualStateMap::new()),
            published: RwLock::new(ActualStateMap::new()),
        }
    }

    pub fn with_skip_heal_for_touched(mut self, skip: bool) -> Self {
        self.skip_heal_for_touched = skip;
        self
    }

    /// Restore the actual-state map from the store. An unreadable snapshot
    /// is logged and the engine starts empty. Returns the number of
    /// instances restored.
    pub async fn load_state(&self) -> usize {
        let restored = match self.store.load().await {
            Ok(map) => map,
            Err(e) => {
                error!(error = %e, "Failed to load state snapshot, starting with empty state");
                ActualStateMap::new()
            }
        };

        let count = restored.len();
        let mut actual = self.actual.lock().await;
        *actual = restored;
        *self.published.write() = actual.clone();

        info!(instances = count, "Restored actual state");
        count
    }

    /// Read-only copy of the actual-state map.
    pub fn snapshot(&self) -> ActualStateMap {
        self.published.read().clone()
    }

    /// Write the current map to the store, waiting for any in-flight cycle.
    pub async fn flush(&self) -> StateResult<()> {
        let actual = self.actual.lock().await;
        self.store.save(&actual).await
    }

    /// Run one reconciliation cycle, unless one is already running.
    #[instrument(skip(self))]
    pub async fn reconcile_once(&self) -> ReconcileOutcome {
        let Ok(mut actual) = self.actual.try_lock() else {
            debug!("Reconciliation already in flight, skipping");
            return ReconcileOutcome::Skipped;
        };

        let desired = match self.provider.fetch().await {
            Ok(entries) => dedupe_by_tenant(entries),
            Err(e) => {
                warn!(error = %e, "Failed to fetch desired state, skipping cycle");
                return ReconcileOutcome::Aborted(e.to_string());
            }
        };

        let mut report = ReconcileReport::default();
        let mut touched: HashSet<TenantId> = HashSet::new();

        for entry in &desired {
            let current = actual.get(&entry.tenant_id).cloned();
            match current {
                None => {
                    touched.insert(entry.tenant_id.clone());
                    match self.start_instance(entry).await {
                        Ok(instance) => {
                            actual.insert(instance);
                            self.persist(&actual).await;
                            report.started += 1;
                        }
                        Err(e) => {
                            error!(
                                tenant_id = %entry.tenant_id,
                                instance = %entry.instance_name(),
                                error = %e,
                                "Failed to start worker"
                            );
                            report.failed += 1;
                        }
                    }
                }
                Some(existing) if existing.resource_id != entry.resource_id => {
                    touched.insert(entry.tenant_id.clone());
                    if self.switch_instance(&mut actual, &existing, entry).await {
                        report.switched += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Some(_) => {}
            }
        }

        let desired_tenants: HashSet<&TenantId> = desired.iter().map(|e| &e.tenant_id).collect();
        let stale: Vec<ManagedInstance> = actual
            .iter()
            .filter(|(tenant, _)| !desired_tenants.contains(tenant))
            .map(|(_, instance)| instance.clone())
            .collect();

        for instance in stale {
            if let Err(e) = self.supervisor.stop(instance.instance_name.as_str()).await {
                warn!(
                    tenant_id = %instance.tenant_id,
                    instance = %instance.instance_name,
                    error = %e,
                    "Failed to stop removed worker, dropping it from state anyway"
                );
                report.failed += 1;
            } else {
                info!(
                    tenant_id = %instance.tenant_id,
                    instance = %instance.instance_name,
                    "Stopped worker for removed tenant"
                );
            }
            actual.remove(&instance.tenant_id);
            self.persist(&actual).await;
            report.stopped += 1;
        }

        self.heal(&mut actual, &desired, &touched, &mut report).await;

        if report.is_empty() {
            debug!(tenants = desired.len(), "Reconciliation cycle: no changes");
        } else {
            info!(
                started = report.started,
                switched = report.switched,
                stopped = report.stopped,
                healed = report.healed,
                failed = report.failed,
                "Reconciliation cycle complete"
            );
        }

        ReconcileOutcome::Completed(report)
    }

    /// Stop a tenant's worker and forget it. Waits for an in-flight cycle.
    /// Returns false when the tenant had no managed instance.
    pub async fn stop_tenant(&self, tenant_id: &TenantId) -> bool {
        let mut actual = self.actual.lock().await;

        let Some(instance) = actual.remove(tenant_id) else {
            return false;
        };

        if let Err(e) = self.supervisor.stop(instance.instance_name.as_str()).await {
            warn!(
                tenant_id = %tenant_id,
                instance = %instance.instance_name,
                error = %e,
                "Failed to stop worker"
            );
        }
        self.persist(&actual).await;

        info!(tenant_id = %tenant_id, instance = %instance.instance_name, "Stopped tenant");
        true
    }

    /// Stop the old worker, then start the new one. The old entry stays if
    /// the stop fails, so a tenant never has two workers.
    async fn switch_instance(
        &self,
        actual: &mut ActualStateMap,
        existing: &ManagedInstance,
        entry: &DesiredStateEntry,
    ) -> bool {
        info!(
            tenant_id = %entry.tenant_id,
            from = %existing.resource_id,
            to = %entry.resource_id,
            "Switching worker resource"
        );

        if let Err(e) = self.supervisor.stop(existing.instance_name.as_str()).await {
            error!(
                tenant_id = %entry.tenant_id,
                instance = %existing.instance_name,
                error = %e,
                "Failed to stop old worker, keeping it until the next cycle"
            );
            return false;
        }

        actual.remove(&entry.tenant_id);
        self.persist(actual).await;

        match self.start_instance(entry).await {
            Ok(instance) => {
                actual.insert(instance);
                self.persist(actual).await;
                true
            }
            Err(e) => {
                error!(
                    tenant_id = %entry.tenant_id,
                    instance = %entry.instance_name(),
                    error = %e,
                    "Failed to start worker for new resource"
                );
                false
            }
        }
    }

    /// Restart desired workers the supervisor lists as missing, errored or
    /// stopped.
    async fn heal(
        &self,
        actual: &mut ActualStateMap,
        desired: &[DesiredStateEntry],
        touched: &HashSet<TenantId>,
        report: &mut ReconcileReport,
    ) {
        let processes = match self.supervisor.list().await {
            Ok(processes) => processes,
            Err(e) => {
                warn!(error = %e, "Failed to list processes, skipping self-heal");
                return;
            }
        };

        let statuses: HashMap<String, ProcessStatus> =
            processes.into_iter().map(|p| (p.name, p.status)).collect();

        for entry in desired {
            if self.skip_heal_for_touched && touched.contains(&entry.tenant_id) {
                continue;
            }
            let Some(instance) = actual.get(&entry.tenant_id).cloned() else {
                continue;
            };
            if !instance.matches(entry) {
                continue;
            }

            let status = statuses.get(instance.instance_name.as_str()).copied();
            if status.map(|s| !s.needs_restart()).unwrap_or(false) {
                continue;
            }

            warn!(
                tenant_id = %entry.tenant_id,
                instance = %instance.instance_name,
                status = status.map(|s| s.as_str()).unwrap_or("missing"),
                "Worker unhealthy, restarting"
            );

            if let Err(e) = self.supervisor.stop(instance.instance_name.as_str()).await {
                warn!(
                    instance = %instance.instance_name,
                    error = %e,
                    "Failed to stop unhealthy worker, starting anyway"
                );
            }

            match self.start_instance(entry).await {
                Ok(restarted) => {
                    actual.insert(restarted);
                    self.persist(actual).await;
                    report.healed += 1;
                }
                Err(e) => {
                    error!(
                        tenant_id = %entry.tenant_id,
                        instance = %instance.instance_name,
                        error = %e,
                        "Failed to restart worker"
                    );
                    actual.remove(&entry.tenant_id);
                    self.persist(actual).await;
                    report.failed += 1;
                }
            }
        }
    }

    async fn start_instance(&self, entry: &DesiredStateEntry) -> SupervisorResult<ManagedInstance> {
        let name = entry.instance_name();
        let spec = self.template.render(entry, &name);

        self.supervisor.start(name.as_str(), &spec).await?;

        info!(tenant_id = %entry.tenant_id, instance = %name, "Started worker");
        Ok(ManagedInstance::new(
            entry.tenant_id.clone(),
            entry.resource_id.clone(),
            Utc::now(),
        ))
    }

    /// Publish the map and save it. A failed save is logged only; the
    /// in-memory map stays authoritative.
    async fn persist(&self, actual: &ActualStateMap) {
        *self.published.write() = actual.clone();
        if let Err(e) = self.store.save(actual).await {
            warn!(error = %e, instances = actual.len(), "Failed to persist actual state");
        }
    }
}
