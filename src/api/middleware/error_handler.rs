//! Converts [`AppError`] into JSON error responses.

use axum::{
    Json,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::error::AppError;

pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Duplicate { .. } => StatusCode::CONFLICT,
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => StatusCode::BAD_REQUEST,
        AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::UnprocessableContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::ConnectionPool { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Database { .. } | AppError::Configuration { .. } | AppError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn error_to_code(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound { .. } => "NOT_FOUND",
        AppError::Duplicate { .. } => "DUPLICATE_ENTRY",
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => "VALIDATION_ERROR",
        AppError::BadRequest { .. } => "BAD_REQUEST",
        AppError::UnprocessableContent { .. } => "UNPROCESSABLE_CONTENT",
        AppError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
        AppError::ConnectionPool { .. } => "SERVICE_UNAVAILABLE",
        AppError::Database { .. } => "DATABASE_ERROR",
        AppError::Configuration { .. } => "CONFIGURATION_ERROR",
        AppError::Internal { .. } => "INTERNAL_ERROR",
    }
}

fn error_body(error: &AppError) -> ErrorResponse {
    let code = error_to_code(error);
    match error {
        AppError::NotFound { entity, field, value } | AppError::Duplicate { entity, field, value } => {
            ErrorResponse::new(code, error.to_string()).with_details(json!({
                "entity": entity,
                "field": field,
                "value": value,
            }))
        }
        AppError::Validation { field, reason } => ErrorResponse::new(code, error.to_string())
            .with_details(json!([{ "field": field, "message": reason }])),
        AppError::ValidationErrors { errors } => {
            let details: Vec<_> = errors
                .iter()
                .map(|e| json!({ "field": e.field, "message": e.message }))
                .collect();
            ErrorResponse::new(code, "Request validation failed").with_details(json!(details))
        }
        AppError::BadRequest { message }
        | AppError::UnprocessableContent { message }
        | AppError::ServiceUnavailable { message } => ErrorResponse::new(code, message.clone()),
        AppError::Database { operation, .. } => {
            ErrorResponse::new(code, format!("Database operation failed: {}", operation))
                .with_details(json!({ "operation": operation }))
        }
        AppError::Configuration { key, .. } => {
            ErrorResponse::new(code, format!("Configuration error: {}", key))
                .with_details(json!({ "key": key }))
        }
        AppError::ConnectionPool { .. } => ErrorResponse::new(code, "Database connection unavailable"),
        AppError::Internal { .. } => ErrorResponse::new(code, "An internal error occurred"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }
        (status, Json(error_body(&self))).into_response()
    }
}

/// Rewrites error responses produced outside the handlers (unknown routes,
/// wrong methods) into the [`ErrorResponse`] shape.
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if is_json {
        return response;
    }

    let code = match status {
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        s if s.is_server_error() => "INTERNAL_SERVER_ERROR",
        _ => "BAD_REQUEST",
    };
    let message = status.canonical_reason().unwrap_or("Request failed");
    (status, Json(ErrorResponse::new(code, message))).into_response()
}
