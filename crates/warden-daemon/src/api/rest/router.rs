//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/instances", get(handlers::list_instances))
        .route("/instances/:tenant_id", get(handlers::get_instance))
        .route("/reports/latest", get(handlers::latest_report))
        .route("/reconcile", post(handlers::trigger_reconcile));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
