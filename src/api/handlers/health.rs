use axum::{Json, Router, extract::State, routing::get};

use crate::api::dto::HealthResponse;
use crate::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Replica identity, global switch and the dependencies it was built with.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let manager = &state.manager;
    Json(HealthResponse {
        version: crate::pkg_version().to_string(),
        replica_id: manager.replica_id().to_string(),
        globally_enabled: manager.is_globally_enabled().await,
        scheduled_jobs: manager.scheduled_jobs().await,
        checks: manager.check_init(),
    })
}
