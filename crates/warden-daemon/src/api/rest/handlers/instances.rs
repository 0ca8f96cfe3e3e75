//! Instance handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use warden_types::{ManagedInstance, TenantId};

/// Actual-state snapshot
pub async fn list_instances(State(state): State<AppState>) -> Json<Vec<ManagedInstance>> {
    let instances: Vec<ManagedInstance> = state
        .reconciler
        .snapshot()
        .iter()
        .map(|(_, instance)| instance.clone())
        .collect();
    Json(instances)
}

/// One tenant's managed instance
pub async fn get_instance(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<ManagedInstance>> {
    state
        .reconciler
        .snapshot()
        .get(&TenantId::new(tenant_id.as_str()))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No instance for tenant {}", tenant_id)))
}

/// Trigger response
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// False when a trigger was already pending
    pub queued: bool,
}

/// Ask for an early reconciliation cycle
pub async fn trigger_reconcile(
    State(state): State<AppState>,
) -> (StatusCode, Json<TriggerResponse>) {
    let queued = state.scheduler.trigger_reconcile();
    tracing::info!(queued, "Reconciliation requested via API");
    (StatusCode::ACCEPTED, Json(TriggerResponse { queued }))
}
