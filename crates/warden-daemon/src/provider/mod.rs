//! Desired-state providers
//!
//! A provider answers one question: which tenant/resource pairings should
//! have a running worker right now.

mod memory;
mod postgres;
mod traits;

pub use memory::StaticDesiredState;
pub use postgres::PostgresDesiredState;
pub use traits::DesiredStateProvider;

use std::sync::Arc;

use crate::config::DesiredStateConfig;
use crate::error::ProviderResult;

/// Build the provider named by the configuration.
pub fn from_config(config: &DesiredStateConfig) -> ProviderResult<Arc<dyn DesiredStateProvider>> {
    match config {
        DesiredStateConfig::Static { entries } => {
            Ok(Arc::new(StaticDesiredState::new(entries.clone())))
        }
        DesiredStateConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
            query,
        } => Ok(Arc::new(PostgresDesiredState::connect_lazy(
            url,
            *max_connections,
            *connect_timeout_secs,
            query.clone(),
        )?)),
    }
}
