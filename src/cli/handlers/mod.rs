//! Subcommand handlers.

pub mod migrate;
pub mod serve;

pub use migrate::{MigrateCommandHandler, run_pending_migrations};
pub use serve::ServeCommandHandler;
