//! Warden daemon library
//!
//! This module provides the core components for the warden daemon:
//! - Desired-state providers
//! - The reconciliation engine and loop scheduling
//! - The read-only status API
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod launch;
pub mod provider;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, DaemonResult, ProviderError, ProviderResult};
pub use launch::WorkerTemplate;
pub use provider::{DesiredStateProvider, PostgresDesiredState, StaticDesiredState};
pub use scheduler::{ReconcileOutcome, ReconcileReport, Reconciler, Scheduler};
pub use server::Server;
