//! Worker launch specs

use warden_supervisor::LaunchSpec;
use warden_types::{DesiredStateEntry, InstanceName};

use crate::config::WorkerConfig;

/// Renders the launch spec for one tenant's worker.
///
/// The rendered environment carries identity only. Credentials for the
/// external system are never part of a launch spec, since launch parameters
/// show up in process listings.
#[derive(Debug, Clone)]
pub struct WorkerTemplate {
    config: WorkerConfig,
}

impl WorkerTemplate {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn render(&self, entry: &DesiredStateEntry, name: &InstanceName) -> LaunchSpec {
        let log_dir = &self.config.log_dir;

        let mut spec = LaunchSpec {
            interpreter: self.config.interpreter.clone(),
            cwd: self.config.cwd.clone(),
            args: self.config.args.clone(),
            max_memory_restart: Some(self.config.max_memory_restart.clone()),
            max_restarts: Some(self.config.max_restarts),
            out_log: Some(log_dir.join(format!("{}-out.log", name))),
            err_log: Some(log_dir.join(format!("{}-error.log", name))),
            ..LaunchSpec::new(self.config.script.clone())
        }
        .with_env("TENANT_ID", entry.tenant_id.as_str())
        .with_env("RESOURCE_ID", entry.resource_id.as_str())
        .with_env("SERVICE_URL", self.config.service_url.as_str());

        if let Some(key) = &self.config.service_api_key {
            spec = spec.with_env("SERVICE_API_KEY", key.as_str());
        }

        spec
    }
}
