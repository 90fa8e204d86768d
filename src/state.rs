//! Application state for Axum web framework.

use std::sync::Arc;

use crate::cron::CronManager;

/// Shared by every handler. Cloning only bumps the manager's reference count.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CronManager>,
}

impl AppState {
    pub fn new(manager: Arc<CronManager>) -> Self {
        Self { manager }
    }
}
