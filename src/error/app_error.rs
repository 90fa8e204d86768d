use thiserror::Error;

use crate::config::error::ConfigError;
use crate::cron::CronError;

/// A single field failure reported by request validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFieldError {
    pub field: String,
    pub message: String,
}

/// Application-wide error type surfaced by the admin API and the CLI.
///
/// Core coordination code reports [`CronError`]; it is converted here so that
/// configuration mistakes reach the caller with a descriptive message while
/// infrastructure failures keep their source chain for logging.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Duplicate entry error for unique constraint violations
    #[error("Duplicate entry: {entity}.{field} = '{value}' already exists")]
    Duplicate {
        entity: String,
        field: String,
        value: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Several request fields failed validation at once
    #[error("Validation failed for {} field(s)", errors.len())]
    ValidationErrors { errors: Vec<ValidationFieldError> },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Request understood but rejected by a domain rule
    #[error("Unprocessable content: {message}")]
    UnprocessableContent { message: String },

    /// The coordination engine is switched off
    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Database operation error with operation context
    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Connection pool error
    #[error("Connection pool error")]
    ConnectionPool {
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<CronError> for AppError {
    fn from(error: CronError) -> Self {
        match error {
            CronError::Disabled => AppError::ServiceUnavailable {
                message: error.to_string(),
            },
            CronError::NotFound(value) => AppError::NotFound {
                entity: "CronConfig".to_string(),
                field: "id".to_string(),
                value,
            },
            CronError::Duplicate { field, value } => AppError::Duplicate {
                entity: "CronConfig".to_string(),
                field,
                value,
            },
            CronError::InvalidCronExpression(expr) => AppError::Validation {
                field: "cronExpression".to_string(),
                reason: format!("Invalid cron expression '{expr}'"),
            },
            CronError::ReservedWatchJob(_) | CronError::Unsupported { .. } => {
                AppError::UnprocessableContent {
                    message: error.to_string(),
                }
            }
            CronError::MissingQuerySecret => AppError::Configuration {
                key: "cron.query_secret".to_string(),
                source: anyhow::Error::new(error),
            },
            CronError::Database { operation, source } => AppError::Database { operation, source },
            CronError::ConnectionPool { source } => AppError::ConnectionPool { source },
            other => AppError::Internal {
                source: anyhow::Error::new(other),
            },
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = match &error {
            ConfigError::ValidationError { field, .. } => field.clone(),
            _ => "settings".to_string(),
        };
        AppError::Configuration {
            key,
            source: anyhow::Error::new(error),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut collected: Vec<ValidationFieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationFieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        collected.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::ValidationErrors { errors: collected }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
