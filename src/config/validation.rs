//! Configuration validation logic
//!
//! Each section checks its own values; `Settings::validate` checks the
//! sections the selected backends actually use.

use crate::config::error::ConfigError;
use crate::config::settings::{
    CronSettings, DatabaseConfig, FileSettings, LoggerSettings, RedisConfig, ServerConfig,
    Settings, StoreBackend,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        if self.keep_alive_timeout == 0 {
            return Err(ConfigError::validation(
                "server.keep_alive_timeout",
                "Keep-alive timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// # Validation Rules
    /// - URL must be a `postgres://` or `postgresql://` URL
    /// - 0 < min connections <= max connections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required when the postgres backend is selected.",
            ));
        }

        if !["postgres://", "postgresql://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
        {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::validation(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationError {
                field: "database.min_connections".to_string(),
                message: format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            });
        }

        Ok(())
    }
}

impl RedisConfig {
    /// An empty URL is allowed and selects the in-process lock service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Ok(());
        }

        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ConfigError::validation(
                "redis.url",
                "Invalid redis URL format. Expected redis:// or rediss://",
            ));
        }

        if self.pool_size == 0 {
            return Err(ConfigError::validation(
                "redis.pool_size",
                "Pool size must be greater than 0.",
            ));
        }

        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }
}

impl CronSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_prefix.trim().is_empty() {
            return Err(ConfigError::validation(
                "cron.lock_prefix",
                "Lock prefix cannot be empty.",
            ));
        }

        if self.lock_prefix.contains(':') {
            return Err(ConfigError::validation(
                "cron.lock_prefix",
                "Lock prefix cannot contain ':'.",
            ));
        }

        if self.query_secret.as_deref().is_some_and(|s| s.is_empty()) {
            return Err(ConfigError::validation(
                "cron.query_secret",
                "Query secret cannot be empty when set.",
            ));
        }

        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        self.file.validate()
    }
}

impl Settings {
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if self.cron.backend == StoreBackend::Postgres {
            self.database.validate()?;
        }
        self.redis.validate()?;
        self.logger.validate()?;
        self.cron.validate()?;
        Ok(())
    }
}
