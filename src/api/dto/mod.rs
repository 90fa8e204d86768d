//! Request and response bodies of the admin API.

mod control;
mod cron;
mod error;
mod health;

pub use control::{ControlResponse, PurgeControlResponse, ToggleControlResponse};
pub use cron::{CreateCronConfigRequest, CronConfigResponse, UpdateCronConfigRequest};
pub use error::ErrorResponse;
pub use health::HealthResponse;
