//! cronmesh: distributed cron coordination for replicated application processes.
//!
//! Every replica runs a [`cron::CronManager`]. Replicas share a database of
//! job configurations and a lock service, and keep their local timers in
//! sync through a short-interval watch job that reacts to a shared control
//! row.

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod cli;
pub mod config;
pub mod cron;
pub mod db;
pub mod error;
pub mod lock;
pub mod logger;
pub mod models;
pub mod repositories;
pub mod schema;
pub mod server;
pub mod state;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
