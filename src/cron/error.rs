use thiserror::Error;

use crate::lock::LockError;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("Cron manager is disabled")]
    Disabled,

    #[error("Cron config not found: {0}")]
    NotFound(String),

    #[error("Cron config already exists: {field} = '{value}'")]
    Duplicate { field: String, value: String },

    #[error("Invalid cron expression: {0}")]
    InvalidCronExpression(String),

    #[error("Cannot {0} the watch job")]
    ReservedWatchJob(&'static str),

    #[error("Query secret not found")]
    MissingQuerySecret,

    #[error("Query encryption failed: {0}")]
    Encryption(String),

    #[error("Query decryption failed: {0}")]
    Decryption(String),

    #[error("Control row not found")]
    ControlMissing,

    #[error("Operation not supported by the {backend} backend: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Connection pool error")]
    ConnectionPool {
        #[source]
        source: anyhow::Error,
    },

    #[error("Lock service error: {0}")]
    Lock(#[from] LockError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CronError {
    pub fn database(operation: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        CronError::Database {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Errors a caller of the control API caused, as opposed to infrastructure failures.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CronError::NotFound(_)
                | CronError::Duplicate { .. }
                | CronError::InvalidCronExpression(_)
                | CronError::ReservedWatchJob(_)
                | CronError::MissingQuerySecret
                | CronError::Encryption(_)
        )
    }
}

pub type CronResult<T> = Result<T, CronError>;
