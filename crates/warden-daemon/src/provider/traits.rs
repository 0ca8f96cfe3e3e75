//! Provider trait definition

use async_trait::async_trait;
use warden_types::DesiredStateEntry;

use crate::error::ProviderResult;

/// Read-only source of the desired state.
#[async_trait]
pub trait DesiredStateProvider: Send + Sync {
    /// Current desired entries, at most one per tenant.
    ///
    /// An error means "unknown", never "empty".
    async fn fetch(&self) -> ProviderResult<Vec<DesiredStateEntry>>;
}
