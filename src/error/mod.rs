//! Errors surfaced by the admin API and the CLI.

mod app_error;
mod database_converter;

pub use app_error::{AppError, AppResult, ValidationFieldError};
pub use database_converter::DatabaseErrorConverter;
