//! Strongly-typed identifiers for tenants, resources and worker processes
//!
//! Tenant and resource identifiers come from the desired-state store as
//! opaque strings; they are wrapped in newtypes so they cannot be swapped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every worker process name.
pub const WORKER_NAME_PREFIX: &str = "worker-";

/// Number of characters kept from each identifier when building a name.
pub const NAME_PREFIX_LEN: usize = 8;

/// Identifier of a tenant (the unit of ownership for at most one worker)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the external resource a tenant's worker operates against
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name under which a worker is registered with the process supervisor.
///
/// The name is a pure function of the tenant/resource pairing, so the same
/// pairing always maps to the same process across controller restarts.
/// Identifiers sharing an 8-character prefix produce the same name; callers
/// that care can detect this with [`InstanceName::for_pairing`] on both sides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceName(String);

impl InstanceName {
    /// Build the worker name for a tenant/resource pairing.
    pub fn for_pairing(tenant_id: &TenantId, resource_id: &ResourceId) -> Self {
        Self(format!(
            "{}{}-{}",
            WORKER_NAME_PREFIX,
            truncate(tenant_id.as_str()),
            truncate(resource_id.as_str())
        ))
    }

    /// Wrap a name reported by the supervisor.
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Whether a supervisor-reported name follows the worker convention.
    pub fn is_worker_name(name: &str) -> bool {
        name.starts_with(WORKER_NAME_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for InstanceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn truncate(id: &str) -> String {
    id.chars().take(NAME_PREFIX_LEN).collect()
}
