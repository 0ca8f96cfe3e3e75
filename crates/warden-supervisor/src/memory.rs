//! In-memory supervisor for development and testing
//!
//! Keeps a process table in memory and records every start/stop it is
//! asked to perform. Failures can be injected per process name.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use warden_types::{ProcessInfo, ProcessStatus};

use crate::error::{SupervisorError, SupervisorResult};
use crate::launch::LaunchSpec;
use crate::traits::ProcessSupervisor;

/// A mutating call received by the in-memory supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCall {
    Start(String),
    Stop(String),
}

#[derive(Debug, Clone)]
struct MemoryProcess {
    info: ProcessInfo,
    spec: Option<LaunchSpec>,
}

/// In-memory process table.
#[derive(Debug, Default)]
pub struct InMemorySupervisor {
    processes: DashMap<String, MemoryProcess>,
    calls: Mutex<Vec<SupervisorCall>>,
    failing_starts: Mutex<HashSet<String>>,
    failing_stops: Mutex<HashSet<String>>,
    failing_list: AtomicBool,
}

impl InMemorySupervisor {
    /// Create an empty supervisor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process that was not started through this supervisor.
    pub fn insert(&self, name: impl Into<String>, status: ProcessStatus) {
        let name = name.into();
        self.processes.insert(
            name.clone(),
            MemoryProcess {
                info: ProcessInfo::new(name, status),
                spec: None,
            },
        );
    }

    /// Change the status of a known process. Returns false if unknown.
    pub fn set_status(&self, name: &str, status: ProcessStatus) -> bool {
        match self.processes.get_mut(name) {
            Some(mut process) => {
                process.info.status = status;
                true
            }
            None => false,
        }
    }

    /// Drop a process from the table, as if it vanished.
    pub fn remove(&self, name: &str) -> bool {
        self.processes.remove(name).is_some()
    }

    /// Make every start of `name` fail until cleared.
    pub fn fail_starts_for(&self, name: impl Into<String>) {
        self.failing_starts.lock().insert(name.into());
    }

    /// Make every stop of `name` fail until cleared.
    pub fn fail_stops_for(&self, name: impl Into<String>) {
        self.failing_stops.lock().insert(name.into());
    }

    /// Make `list` fail (or succeed again).
    pub fn fail_list(&self, fail: bool) {
        self.failing_list.store(fail, Ordering::SeqCst);
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.failing_starts.lock().clear();
        self.failing_stops.lock().clear();
        self.failing_list.store(false, Ordering::SeqCst);
    }

    /// Mutating calls received so far, in order.
    pub fn calls(&self) -> Vec<SupervisorCall> {
        self.calls.lock().clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Launch spec a process was started with.
    pub fn launch_spec(&self, name: &str) -> Option<LaunchSpec> {
        self.processes.get(name).and_then(|p| p.spec.clone())
    }

    /// Names currently in the table, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processes.iter().map(|p| p.key().clone()).collect();
        names.sort();
        names
    }

    fn record(&self, call: SupervisorCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ProcessSupervisor for InMemorySupervisor {
    async fn describe(&self, name: &str) -> SupervisorResult<Option<ProcessInfo>> {
        Ok(self.processes.get(name).map(|p| p.info.clone()))
    }

    async fn start(&self, name: &str, spec: &LaunchSpec) -> SupervisorResult<()> {
        self.record(SupervisorCall::Start(name.to_string()));

        if self.failing_starts.lock().contains(name) {
            return Err(SupervisorError::CommandFailed {
                command: format!("start {}", name),
                code: Some(1),
                message: "injected start failure".to_string(),
            });
        }

        if let Some(existing) = self.processes.get(name) {
            if existing.info.status.is_online() {
                return Ok(());
            }
        }

        let previous_restarts = self.processes.get(name).map(|p| p.info.restarts).unwrap_or(0);
        let mut info = ProcessInfo::new(name, ProcessStatus::Online);
        info.restarts = previous_restarts;
        self.processes.insert(
            name.to_string(),
            MemoryProcess {
                info,
                spec: Some(spec.clone()),
            },
        );

        Ok(())
    }

    async fn stop(&self, name: &str) -> SupervisorResult<()> {
        self.record(SupervisorCall::Stop(name.to_string()));

        if self.failing_stops.lock().contains(name) {
            return Err(SupervisorError::CommandFailed {
                command: format!("stop {}", name),
                code: Some(1),
                message: "injected stop failure".to_string(),
            });
        }

        self.processes.remove(name);
        Ok(())
    }

    async fn list(&self) -> SupervisorResult<Vec<ProcessInfo>> {
        if self.failing_list.load(Ordering::SeqCst) {
            return Err(SupervisorError::CommandFailed {
                command: "list".to_string(),
                code: Some(1),
                message: "injected list failure".to_string(),
            });
        }

        let mut processes: Vec<ProcessInfo> =
            self.processes.iter().map(|p| p.info.clone()).collect();
        processes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(processes)
    }
}
