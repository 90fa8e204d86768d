//! Router assembly for the admin API.

use axum::{Router, middleware};

use crate::api::handlers;
use crate::api::middleware::{global_error_handler, logging_middleware, request_id_middleware};
use crate::state::AppState;

/// Builds the admin router.
///
/// # Routes
/// - `/health` - replica status
/// - `/api/cmc` - control row
/// - `/api/cron/config` - cron configs
///
/// Layers run outermost first: request ID, logging, error conversion.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(handlers::control::control_routes())
        .nest("/cron", handlers::cron::cron_routes());

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api", api_routes)
        .layer(middleware::from_fn(global_error_handler))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::{CronManager, CronManagerOptions, MethodRegistry};
    use crate::lock::MemoryLockService;
    use crate::repositories::MemoryOperations;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let mut options = CronManagerOptions::new("replica-a");
        options.query_secret = Some("router-secret".to_string());
        let manager = CronManager::new(
            options,
            Arc::new(MemoryOperations::new()),
            Arc::new(MemoryLockService::new()),
            MethodRegistry::new(),
        )
        .await
        .unwrap();
        manager.prepare().await.unwrap();
        create_router(AppState::new(manager))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_config_lifecycle() {
        let app = app().await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/cron/config",
            Some(json!({
                "name": "cleanup",
                "jobType": "query",
                "cronExpression": "0 0 * * * *",
                "query": "DELETE FROM sessions"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["hasQuery"], true);
        assert!(created.get("query").is_none());
        let id = created["id"].as_i64().unwrap();

        let (status, listed) = send(&app, Method::GET, "/api/cron/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, toggled) =
            send(&app, Method::PUT, &format!("/api/cron/config/{id}/toggle"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["enabled"], false);

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/cron/config/{id}"),
            Some(json!({"cronExpression": "0 30 * * * *"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["cronExpression"], "0 30 * * * *");

        let (status, all) = send(&app, Method::PUT, "/api/cron/config/all/enable", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all[0]["enabled"], true);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict() {
        let app = app().await;
        let body = json!({"name": "report", "jobType": "inline"});

        let (status, _) = send(&app, Method::POST, "/api/cron/config", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, error) = send(&app, Method::POST, "/api/cron/config", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["code"], "DUPLICATE_ENTRY");
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let app = app().await;

        let (status, error) = send(
            &app,
            Method::POST,
            "/api/cron/config",
            Some(json!({"name": "", "jobType": "method"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/cron/config",
            Some(json!({"name": "bad", "jobType": "method", "cronExpression": "whenever"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, error) = send(&app, Method::PUT, "/api/cron/config/999/toggle", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_control_endpoints() {
        let app = app().await;

        let (status, control) = send(&app, Method::GET, "/api/cmc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(control["replicaIds"], json!(["replica-a"]));
        assert_eq!(control["enabled"], true);

        let (status, toggled) = send(&app, Method::PATCH, "/api/cmc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["enabled"], false);

        // mutations are refused while the deployment is disabled
        let (status, error) = send(
            &app,
            Method::POST,
            "/api/cron/config",
            Some(json!({"name": "report", "jobType": "inline"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error["code"], "SERVICE_UNAVAILABLE");

        let (status, purged) = send(&app, Method::DELETE, "/api/cmc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(purged["purged"], true);
    }

    #[tokio::test]
    async fn test_health_and_unknown_route() {
        let app = app().await;

        let (status, health) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["replicaId"], "replica-a");
        assert_eq!(health["scheduledJobs"], json!(["cmc"]));

        let (status, error) = send(&app, Method::GET, "/api/nothing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["code"], "NOT_FOUND");
    }
}
