//! Handlers for the shared control row (`cmc`).

use axum::{Json, Router, extract::State, routing::get};

use crate::api::dto::{ControlResponse, PurgeControlResponse, ToggleControlResponse};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Routes:
/// - GET /cmc     - Read the control row
/// - PATCH /cmc   - Flip the global switch
/// - DELETE /cmc  - Forget every replica and rejoin
pub fn control_routes() -> Router<AppState> {
    Router::new().route(
        "/cmc",
        get(get_control).patch(toggle_control).delete(purge_control),
    )
}

async fn get_control(State(state): State<AppState>) -> AppResult<Json<ControlResponse>> {
    let control = state
        .manager
        .get_control()
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "CronManagerControl".to_string(),
            field: "replicaId".to_string(),
            value: state.manager.replica_id().to_string(),
        })?;
    Ok(Json(control.into()))
}

async fn toggle_control(State(state): State<AppState>) -> AppResult<Json<ToggleControlResponse>> {
    let enabled = state.manager.toggle_control().await?;
    Ok(Json(ToggleControlResponse { enabled }))
}

async fn purge_control(State(state): State<AppState>) -> AppResult<Json<PurgeControlResponse>> {
    let purged = state.manager.purge_control().await?;
    Ok(Json(PurgeControlResponse { purged }))
}
