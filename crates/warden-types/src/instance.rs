//! Desired and actual fleet state
//!
//! The desired set is produced fresh on every poll and never persisted. The
//! actual-state map is owned by the reconciliation engine and mirrored to
//! disk after every structural change.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InstanceName, ResourceId, TenantId};

/// A tenant that should currently have a running worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesiredStateEntry {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
}

impl DesiredStateEntry {
    pub fn new(tenant_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            tenant_id: TenantId::new(tenant_id),
            resource_id: ResourceId::new(resource_id),
        }
    }

    /// Worker name this entry maps to.
    pub fn instance_name(&self) -> InstanceName {
        InstanceName::for_pairing(&self.tenant_id, &self.resource_id)
    }
}

/// Keep the first entry seen for each tenant, preserving input order.
///
/// Providers return newest-first, so the first entry is the newest active
/// resource for that tenant.
pub fn dedupe_by_tenant(entries: Vec<DesiredStateEntry>) -> Vec<DesiredStateEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.tenant_id.clone()))
        .collect()
}

/// A worker the controller started and believes to be running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedInstance {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub instance_name: InstanceName,
    pub started_at: DateTime<Utc>,
}

impl ManagedInstance {
    pub fn new(tenant_id: TenantId, resource_id: ResourceId, started_at: DateTime<Utc>) -> Self {
        let instance_name = InstanceName::for_pairing(&tenant_id, &resource_id);
        Self {
            tenant_id,
            resource_id,
            instance_name,
            started_at,
        }
    }

    /// Whether this instance already serves the desired entry.
    pub fn matches(&self, desired: &DesiredStateEntry) -> bool {
        self.tenant_id == desired.tenant_id && self.resource_id == desired.resource_id
    }
}

/// The controller's authoritative tenant -> instance view.
///
/// Keys are always the instance's own tenant, so the map can never hold two
/// instances for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualStateMap {
    instances: BTreeMap<TenantId, ManagedInstance>,
}

impl ActualStateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted pairs. The pair key is ignored in favour of the
    /// instance's own tenant; later pairs win.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TenantId, ManagedInstance)>) -> Self {
        let mut map = Self::new();
        for (_, instance) in pairs {
            map.insert(instance);
        }
        map
    }

    /// Ordered `(tenant, instance)` pairs, as written to the snapshot file.
    pub fn to_pairs(&self) -> Vec<(TenantId, ManagedInstance)> {
        self.instances
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn get(&self, tenant_id: &TenantId) -> Option<&ManagedInstance> {
        self.instances.get(tenant_id)
    }

    pub fn contains(&self, tenant_id: &TenantId) -> bool {
        self.instances.contains_key(tenant_id)
    }

    /// Insert or replace the instance for its tenant, returning the previous one.
    pub fn insert(&mut self, instance: ManagedInstance) -> Option<ManagedInstance> {
        self.instances.insert(instance.tenant_id.clone(), instance)
    }

    pub fn remove(&mut self, tenant_id: &TenantId) -> Option<ManagedInstance> {
        self.instances.remove(tenant_id)
    }

    pub fn tenants(&self) -> Vec<TenantId> {
        self.instances.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TenantId, &ManagedInstance)> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
