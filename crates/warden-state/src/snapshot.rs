//! On-disk snapshot of the actual-state map

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_types::{ActualStateMap, ManagedInstance, TenantId};

/// Serialized form of an [`ActualStateMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Ordered `(tenant, instance)` pairs.
    pub instances: Vec<(TenantId, ManagedInstance)>,

    /// When the snapshot was taken.
    pub last_updated: DateTime<Utc>,
}

impl StateSnapshot {
    pub fn capture(map: &ActualStateMap) -> Self {
        Self {
            instances: map.to_pairs(),
            last_updated: Utc::now(),
        }
    }

    pub fn into_map(self) -> ActualStateMap {
        ActualStateMap::from_pairs(self.instances)
    }
}
