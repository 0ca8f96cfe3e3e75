//! Configuration for warden-daemon

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use warden_health::HealthConfig;
use warden_types::DesiredStateEntry;

use crate::error::{DaemonError, DaemonResult};

/// Desired-state query: newest active resource per tenant.
pub const DEFAULT_DESIRED_STATE_QUERY: &str = r#"
SELECT DISTINCT ON (r.tenant_id)
    r.tenant_id::text AS tenant_id,
    r.id::text AS resource_id
FROM resources r
WHERE r.is_active
ORDER BY r.tenant_id, r.created_at DESC
"#;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Reconciliation engine configuration
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Health monitor configuration
    #[serde(default)]
    pub health: HealthConfig,

    /// Where the desired state comes from
    #[serde(default)]
    pub desired_state: DesiredStateConfig,

    /// Process supervisor backend
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Worker launch template
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Status API configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reconciliation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,

    /// Actual-state snapshot file
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Leave tenants acted on earlier in a cycle out of that cycle's
    /// self-heal pass
    #[serde(default = "default_true")]
    pub skip_heal_for_touched: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval(),
            state_file: default_state_file(),
            skip_heal_for_touched: true,
        }
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Desired-state source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DesiredStateConfig {
    /// Fixed list of entries (for development/testing)
    Static {
        #[serde(default)]
        entries: Vec<DesiredStateEntry>,
    },

    /// PostgreSQL query
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,

        /// Query returning `tenant_id` and `resource_id` text columns
        #[serde(default = "default_query")]
        query: String,
    },
}

impl Default for DesiredStateConfig {
    fn default() -> Self {
        DesiredStateConfig::Static {
            entries: Vec::new(),
        }
    }
}

/// Process supervisor backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SupervisorConfig {
    /// In-memory process table (for development/testing)
    #[default]
    Memory,

    /// The pm2 process manager
    Pm2 {
        /// pm2 executable
        #[serde(default = "default_pm2_binary")]
        binary: PathBuf,

        /// Timeout for a single pm2 command in seconds
        #[serde(default = "default_command_timeout")]
        command_timeout_secs: u64,
    },
}

/// Worker launch template.
///
/// Only identity parameters and supervision policy go here. Workers fetch
/// their credentials themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker entry point
    #[serde(default = "default_worker_script")]
    pub script: PathBuf,

    /// Interpreter, e.g. `node`
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Working directory
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Extra worker arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Coordinating service the worker calls back into
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Shared non-sensitive key for the coordinating service
    #[serde(default)]
    pub service_api_key: Option<String>,

    /// Memory limit that makes the supervisor restart the worker
    #[serde(default = "default_max_memory_restart")]
    pub max_memory_restart: String,

    /// Restart budget the supervisor applies on its own
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Directory for worker stdout/stderr logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            script: default_worker_script(),
            interpreter: None,
            cwd: None,
            args: Vec::new(),
            service_url: default_service_url(),
            service_api_key: None,
            max_memory_restart: default_max_memory_restart(),
            max_restarts: default_max_restarts(),
            log_dir: default_log_dir(),
        }
    }
}

/// Status API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Serve the status API
    #[serde(default)]
    pub enabled: bool,

    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_listen_addr(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    60
}

fn default_state_file() -> PathBuf {
    PathBuf::from("./data/instances.json")
}

fn default_pool_size() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_query() -> String {
    DEFAULT_DESIRED_STATE_QUERY.trim().to_string()
}

fn default_pm2_binary() -> PathBuf {
    PathBuf::from("pm2")
}

fn default_command_timeout() -> u64 {
    30
}

fn default_worker_script() -> PathBuf {
    PathBuf::from("./worker/index.js")
}

fn default_service_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_max_memory_restart() -> String {
    "500M".to_string()
}

fn default_max_restarts() -> u32 {
    10
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8090))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `WARDEN_*` environment variables (`__` separates nested keys, e.g.
    /// `WARDEN_RECONCILE__INTERVAL_SECS`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // An explicitly named file must exist
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WARDEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject configurations the daemon cannot run with.
    pub fn validate(&self) -> DaemonResult<()> {
        if self.reconcile.interval_secs == 0 {
            return Err(DaemonError::Config(
                "reconcile.interval_secs must be positive".to_string(),
            ));
        }
        if self.health.interval_secs == 0 {
            return Err(DaemonError::Config(
                "health.interval_secs must be positive".to_string(),
            ));
        }
        if self.health.alert_threshold == 0 {
            return Err(DaemonError::Config(
                "health.alert_threshold must be positive".to_string(),
            ));
        }
        if self.health.retain_reports == 0 {
            return Err(DaemonError::Config(
                "health.retain_reports must be positive".to_string(),
            ));
        }
        if let DesiredStateConfig::Postgres { url, query, .. } = &self.desired_state {
            if url.trim().is_empty() {
                return Err(DaemonError::Config(
                    "desired_state.url must not be empty".to_string(),
                ));
            }
            if query.trim().is_empty() {
                return Err(DaemonError::Config(
                    "desired_state.query must not be empty".to_string(),
                ));
            }
        }
        if self.worker.script.as_os_str().is_empty() {
            return Err(DaemonError::Config("worker.script must be set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.reconcile.interval_secs, 60);
        assert_eq!(config.health.interval_secs, 30);
        assert_eq!(config.server.listen_addr.port(), 8090);
        assert!(!config.server.enabled);
        assert!(matches!(config.supervisor, SupervisorConfig::Memory));
        assert!(matches!(config.desired_state, DesiredStateConfig::Static { .. }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_defaults() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.max_memory_restart, "500M");
        assert_eq!(worker.max_restarts, 10);
        assert!(worker.service_api_key.is_none());
    }

    #[test]
    fn test_load_defaults_without_file() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.reconcile.state_file, PathBuf::from("./data/instances.json"));
        assert_eq!(config.health.retain_reports, 10);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[reconcile]
interval_secs = 15

[supervisor]
type = "pm2"
binary = "/usr/local/bin/pm2"

[desired_state]
type = "static"
entries = [{{ tenant_id = "t1", resource_id = "r1" }}]
"#
        )
        .unwrap();

        let config = DaemonConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.reconcile.interval_secs, 15);
        match config.supervisor {
            SupervisorConfig::Pm2 {
                binary,
                command_timeout_secs,
            } => {
                assert_eq!(binary, PathBuf::from("/usr/local/bin/pm2"));
                assert_eq!(command_timeout_secs, 30);
            }
            other => panic!("unexpected supervisor config: {:?}", other),
        }
        match config.desired_state {
            DesiredStateConfig::Static { entries } => {
                assert_eq!(entries, vec![DesiredStateEntry::new("t1", "r1")]);
            }
            other => panic!("unexpected desired-state config: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DaemonConfig::load(Some("/nonexistent/warden.toml")).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_postgres_url() {
        let config = DaemonConfig {
            desired_state: DesiredStateConfig::Postgres {
                url: String::new(),
                max_connections: 5,
                connect_timeout_secs: 5,
                query: default_query(),
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DaemonError::Config(_))));
    }
}
