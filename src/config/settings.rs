//! Configuration settings structures for cronmesh
//!
//! Every section deserializes with defaults, so a partial TOML file or a
//! handful of `CRONMESH_*` variables is enough to start a replica.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "cronmesh".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_keep_alive_timeout() -> u64 {
    75
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    4
}

fn default_redis_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/cronmesh.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_watch_time() -> String {
    "5s".to_string()
}

fn default_lock_prefix() -> String {
    "cronmesh".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Admin HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Keep-alive timeout in seconds
    #[serde(default = "default_keep_alive_timeout")]
    pub keep_alive_timeout: u64,
}

impl ServerConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            keep_alive_timeout: default_keep_alive_timeout(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// Postgres connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Run pending migrations when `serve` starts
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// Redis Configuration
// ============================================================================

/// Lock service connection. An empty URL selects the in-process lock service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_redis_connection_timeout")]
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            connection_timeout: default_redis_connection_timeout(),
        }
    }
}

// ============================================================================
// Cron Configuration
// ============================================================================

/// Where configs, job records and the control row live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

/// Settings of the local cron manager replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSettings {
    /// Local switch. A disabled replica joins the deployment but schedules nothing.
    #[serde(default)]
    pub enabled: bool,

    /// Identity in the control row; `$HOSTNAME` or a random UUID when unset
    #[serde(default)]
    pub replica_id: Option<String>,

    /// Watch interval, `"1s"` to `"5s"`
    #[serde(default = "default_watch_time")]
    pub watch_time: String,

    /// Secret for query job encryption
    #[serde(default)]
    pub query_secret: Option<String>,

    /// Delete every lock key under `lock_prefix` on shutdown
    #[serde(default)]
    pub release_locks_on_shutdown: bool,

    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_lock_prefix")]
    pub lock_prefix: String,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            replica_id: None,
            watch_time: default_watch_time(),
            query_secret: None,
            release_locks_on_shutdown: false,
            backend: StoreBackend::default(),
            lock_prefix: default_lock_prefix(),
        }
    }
}

impl CronSettings {
    pub fn resolved_replica_id(&self) -> String {
        self.replica_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// `full`, `compact` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Converts the file representation into the runtime logger configuration.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format".to_string(), e.to_string()))?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format).map_err(|e| {
            ConfigError::ValidationError {
                field: "logger.file".to_string(),
                message: e.to_string(),
            }
        })
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub cron: CronSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_cron_settings() -> impl Strategy<Value = CronSettings> {
        (
            any::<bool>(),
            proptest::option::of("[a-z][a-z0-9-]{0,15}"),
            "[1-5]s",
            proptest::option::of("[a-zA-Z0-9]{8,32}"),
            any::<bool>(),
            prop_oneof![Just(StoreBackend::Postgres), Just(StoreBackend::Memory)],
            "[a-z]{1,10}",
        )
            .prop_map(
                |(enabled, replica_id, watch_time, query_secret, release, backend, lock_prefix)| {
                    CronSettings {
                        enabled,
                        replica_id,
                        watch_time,
                        query_secret,
                        release_locks_on_shutdown: release,
                        backend,
                        lock_prefix,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn prop_cron_settings_toml_round_trip(cron in arb_cron_settings()) {
            let settings = Settings { cron, ..Default::default() };
            let toml = toml::to_string(&settings).unwrap();
            let parsed: Settings = toml::from_str(&toml).unwrap();
            prop_assert_eq!(parsed, settings);
        }
    }

    #[test]
    fn test_cron_settings_defaults() {
        let cron = CronSettings::default();
        assert!(!cron.enabled);
        assert_eq!(cron.replica_id, None);
        assert_eq!(cron.watch_time, "5s");
        assert_eq!(cron.backend, StoreBackend::Postgres);
        assert_eq!(cron.lock_prefix, "cronmesh");
        assert!(!cron.release_locks_on_shutdown);
    }

    #[test]
    fn test_resolved_replica_id_prefers_configured_value() {
        let cron = CronSettings {
            replica_id: Some("replica-1".to_string()),
            ..Default::default()
        };
        assert_eq!(cron.resolved_replica_id(), "replica-1");
    }

    #[test]
    fn test_resolved_replica_id_falls_back() {
        let cron = CronSettings {
            replica_id: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!cron.resolved_replica_id().trim().is_empty());
    }

    #[test]
    fn test_server_config_address() {
        let server = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(server.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let toml = r#"
            [database]
            url = "postgres://localhost/cron"

            [cron]
            enabled = true
            backend = "memory"
            query_secret = "s3cret"
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.database.url, "postgres://localhost/cron");
        assert_eq!(settings.database.max_connections, 10);
        assert!(settings.cron.enabled);
        assert_eq!(settings.cron.backend, StoreBackend::Memory);
        assert_eq!(settings.cron.query_secret.as_deref(), Some("s3cret"));
        assert_eq!(settings.cron.watch_time, "5s");
        assert_eq!(settings.redis, RedisConfig::default());
        assert_eq!(settings.server, ServerConfig::default());
    }

    #[test]
    fn test_logger_settings_into_logger_config() {
        let settings = LoggerSettings {
            level: "debug".to_string(),
            console: ConsoleSettings {
                enabled: true,
                colored: false,
            },
            file: FileSettings {
                enabled: true,
                path: "/tmp/cronmesh-test.log".to_string(),
                append: false,
                format: "compact".to_string(),
            },
        };

        let config = settings.into_logger_config().unwrap();
        assert_eq!(config.level, "debug");
        assert!(!config.console.colored);
        assert_eq!(config.file.format, LogFormat::Compact);
        assert_eq!(config.file.path, PathBuf::from("/tmp/cronmesh-test.log"));
    }

    #[test]
    fn test_file_settings_invalid_format() {
        let file = FileSettings {
            format: "xml".to_string(),
            ..Default::default()
        };
        let err = file.into_file_config().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "logger.file.format")
        );
    }
}
