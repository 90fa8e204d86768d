//! Layered configuration for cronmesh
//!
//! # Configuration Priority (lowest to highest)
//! 1. `default.toml` - Base default configuration
//! 2. `{environment}.toml` - Environment-specific configuration
//! 3. `local.toml` - Local overrides (not committed to version control)
//! 4. `CRONMESH_*` environment variables, e.g. `CRONMESH_CRON__REPLICA_ID`

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use loader::ConfigLoader;
pub use settings::{
    CronSettings, DatabaseConfig, LoggerSettings, RedisConfig, ServerConfig, Settings,
    StoreBackend,
};
