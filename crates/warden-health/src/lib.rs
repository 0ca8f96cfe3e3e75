//! # Warden Health - Health monitoring for tenant worker fleets
//!
//! The [`HealthMonitor`] runs on its own timer, independent of the
//! reconciliation engine. Each cycle it:
//!
//! 1. lists processes from the supervisor and partitions them into workers,
//!    auxiliary services and the controller itself
//! 2. tracks consecutive non-online observations per worker and raises an
//!    alert when a worker crosses the threshold
//! 3. probes an external HTTP health endpoint
//! 4. assembles a [`HealthReport`](warden_types::HealthReport)
//! 5. writes the report to disk and prunes old reports
//!
//! The monitor never restarts anything itself. Remediation belongs to the
//! reconciliation engine's self-healing pass; the monitor can at most ask
//! for an early reconciliation through an [`AlertSink`].

pub mod config;
pub mod error;
pub mod failures;
pub mod monitor;
pub mod probe;
pub mod reports;

pub use config::HealthConfig;
pub use error::{HealthError, HealthResult};
pub use failures::{FailureAlert, FailureTracker};
pub use monitor::{AlertSink, CycleSummary, HealthMonitor, MonitorOutcome};
pub use probe::{HealthProbe, HttpProbe};
pub use reports::ReportStore;
