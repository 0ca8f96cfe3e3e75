//! # Warden Supervisor - Process Supervisor Adapter
//!
//! A narrow interface over an external process-management facility. The
//! reconciliation engine and health monitor depend only on
//! [`ProcessSupervisor`]; backends are swappable.
//!
//! ## Backends
//!
//! - [`Pm2Supervisor`]: drives the `pm2` command-line tool
//! - [`InMemorySupervisor`]: process table held in memory, for development
//!   and tests
//!
//! ## Launch parameters
//!
//! [`LaunchSpec`] carries only non-secret identity parameters and
//! supervision policy. Launch parameters are visible in process listings, so
//! workers fetch their credentials themselves at startup.

pub mod error;
pub mod launch;
pub mod memory;
pub mod pm2;
pub mod traits;

pub use error::{SupervisorError, SupervisorResult};
pub use launch::LaunchSpec;
pub use memory::{InMemorySupervisor, SupervisorCall};
pub use pm2::Pm2Supervisor;
pub use traits::ProcessSupervisor;
