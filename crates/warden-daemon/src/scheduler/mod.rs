//! Control loops
//!
//! The [`Reconciler`] owns the actual-state map; the [`Scheduler`] drives it
//! and the health monitor on their own timers.

mod reconciler;
mod runner;

pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler};
pub use runner::Scheduler;
