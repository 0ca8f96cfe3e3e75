//! Health and report handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, Json};
use serde::Serialize;
use warden_types::HealthReport;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    pub managed_instances: usize,
}

/// Liveness of the daemon itself
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        managed_instances: state.reconciler.snapshot().len(),
    })
}

/// Most recent fleet health report
pub async fn latest_report(State(state): State<AppState>) -> ApiResult<Json<HealthReport>> {
    let report = state.monitor.reports().latest().await?;
    report
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No health report written yet".to_string()))
}
