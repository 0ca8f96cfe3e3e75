//! The supervisor interface consumed by the control loops

use async_trait::async_trait;
use warden_types::ProcessInfo;

use crate::error::SupervisorResult;
use crate::launch::LaunchSpec;

/// Start/stop/describe/list over named OS processes.
///
/// Implementations must keep `stop` idempotent: stopping a name the
/// supervisor does not know is a success.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Look up a single process; `None` when the name is unknown.
    async fn describe(&self, name: &str) -> SupervisorResult<Option<ProcessInfo>>;

    /// Start a named process.
    async fn start(&self, name: &str, spec: &LaunchSpec) -> SupervisorResult<()>;

    /// Stop and forget a named process.
    async fn stop(&self, name: &str) -> SupervisorResult<()>;

    /// Every process the supervisor currently knows.
    async fn list(&self) -> SupervisorResult<Vec<ProcessInfo>>;

    /// Release any connection held to the supervisor.
    async fn disconnect(&self) -> SupervisorResult<()> {
        Ok(())
    }
}
