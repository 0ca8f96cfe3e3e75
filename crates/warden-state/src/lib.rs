//! # Warden State - Crash-recoverable actual-state snapshots
//!
//! The reconciliation engine mirrors its actual-state map here after every
//! structural change, so a controller restart repopulates its view of which
//! workers it owns without re-deriving ownership from the supervisor.
//!
//! ## Snapshot format
//!
//! ```json
//! {
//!   "instances": [["<tenant>", {"tenantId": "...", "resourceId": "...",
//!                  "instanceName": "worker-...", "startedAt": "..."}]],
//!   "lastUpdated": "2026-01-01T00:00:00Z"
//! }
//! ```

pub mod error;
pub mod snapshot;
pub mod storage;

pub use error::{StateError, StateResult};
pub use snapshot::StateSnapshot;
pub use storage::{FileStateStore, InMemoryStateStore, StateStore};
