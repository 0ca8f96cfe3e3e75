//! Warden Types - Core types for the tenant worker fleet controller
//!
//! Warden keeps one long-running worker process per active tenant/resource
//! pairing converged with the desired state declared in a relational store.
//!
//! ## Key Concepts
//!
//! - **DesiredStateEntry**: a tenant that should currently have a worker, and
//!   the resource that worker operates against
//! - **ManagedInstance**: a worker the controller believes it is running
//! - **ActualStateMap**: the controller's authoritative tenant -> instance view
//! - **ProcessInfo**: what the process supervisor reports about a named process
//! - **HealthReport**: one Health Monitor cycle's findings

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod ids;
pub mod instance;
pub mod process;
pub mod report;

pub use ids::{InstanceName, ResourceId, TenantId, NAME_PREFIX_LEN, WORKER_NAME_PREFIX};
pub use instance::{dedupe_by_tenant, ActualStateMap, DesiredStateEntry, ManagedInstance};
pub use process::{ProcessInfo, ProcessStatus};
pub use report::{
    HealthReport, OverallStatus, ProbeOutcome, ServiceStatus, WorkerCounts, WorkerIssue,
};
