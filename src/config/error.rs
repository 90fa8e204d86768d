use thiserror::Error;

/// Failure to load or validate [`Settings`](super::Settings).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// `field` is the dotted settings path, e.g. `cron.lock_prefix`.
    #[error("Invalid {field}: {message}")]
    ValidationError { field: String, message: String },

    /// `CRONMESH_APP_ENV` holds an unknown environment name.
    #[error("Environment variable error: {0}")]
    EnvVarError(String),

    /// `CRONMESH_CONFIG_DIR` and `CRONMESH_CONFIG_FILE` were both set.
    #[error("Conflicting configuration sources: {0}")]
    MutualExclusivityError(String),

    #[error("Configuration source error: {0}")]
    Other(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        ConfigError::FileNotFound(path.into())
    }

    pub fn mutual_exclusivity(message: impl Into<String>) -> Self {
        ConfigError::MutualExclusivityError(message.into())
    }
}
