//! Cron config management handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};

use crate::api::dto::{CreateCronConfigRequest, CronConfigResponse, UpdateCronConfigRequest};
use crate::api::extract::ValidatedJson;
use crate::error::AppResult;
use crate::state::AppState;

/// Routes:
/// - GET /config                 - List configs (watch job excluded)
/// - POST /config                - Create a config
/// - PUT /config/{id}            - Update a config
/// - PUT /config/{id}/toggle     - Flip `enabled`
/// - PUT /config/all/enable      - Enable every config
/// - PUT /config/all/disable     - Disable every config
pub fn cron_routes() -> Router<AppState> {
    Router::new()
        .route("/config", get(list_cron_config).post(create_cron_config))
        .route("/config/all/enable", put(enable_all_cron_config))
        .route("/config/all/disable", put(disable_all_cron_config))
        .route("/config/{id}", put(update_cron_config))
        .route("/config/{id}/toggle", put(toggle_cron_config))
}

fn responses(configs: Vec<crate::models::CronConfig>) -> Vec<CronConfigResponse> {
    configs.into_iter().map(CronConfigResponse::from).collect()
}

async fn list_cron_config(State(state): State<AppState>) -> AppResult<Json<Vec<CronConfigResponse>>> {
    let configs = state.manager.list_cron_config().await?;
    Ok(Json(responses(configs)))
}

async fn create_cron_config(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCronConfigRequest>,
) -> AppResult<(StatusCode, Json<CronConfigResponse>)> {
    let config = state
        .manager
        .create_cron_config(payload.into_new_cron_config())
        .await?;
    Ok((StatusCode::CREATED, Json(config.into())))
}

async fn update_cron_config(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateCronConfigRequest>,
) -> AppResult<Json<CronConfigResponse>> {
    let config = state
        .manager
        .update_cron_config(id, payload.into_update_cron_config())
        .await?;
    Ok(Json(config.into()))
}

async fn toggle_cron_config(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<CronConfigResponse>> {
    let config = state.manager.toggle_cron_config(id).await?;
    Ok(Json(config.into()))
}

async fn enable_all_cron_config(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CronConfigResponse>>> {
    let configs = state.manager.enable_all_cron_config().await?;
    Ok(Json(responses(configs)))
}

async fn disable_all_cron_config(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CronConfigResponse>>> {
    let configs = state.manager.disable_all_cron_config().await?;
    Ok(Json(responses(configs)))
}
