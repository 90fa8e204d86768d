use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::cron::CronError;

/// Utility for converting diesel errors raised by the Postgres backend.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to the matching [`CronError`] variant.
    ///
    /// Unique violations on `cron_configs.name` become `Duplicate` so the
    /// control API can report them; everything else keeps the operation name.
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> CronError {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let field = info
                    .constraint_name()
                    .and_then(Self::field_from_constraint)
                    .unwrap_or("name")
                    .to_string();
                let value = Self::value_from_detail(info.details()).unwrap_or_default();
                CronError::Duplicate { field, value }
            }
            DieselError::NotFound => CronError::NotFound(operation.to_string()),
            other => CronError::database(operation, other),
        }
    }

    /// `cron_configs_name_key` -> `name`
    fn field_from_constraint(constraint: &str) -> Option<&str> {
        let trimmed = constraint.strip_suffix("_key")?;
        trimmed.strip_prefix("cron_configs_")
    }

    /// Extracts the offending value from a Postgres detail line such as
    /// `Key (name)=(report) already exists.`
    fn value_from_detail(detail: Option<&str>) -> Option<String> {
        let detail = detail?;
        let start = detail.find(")=(")? + 3;
        let end = detail[start..].find(')')? + start;
        Some(detail[start..end].to_string())
    }
}

impl From<DieselError> for CronError {
    fn from(error: DieselError) -> Self {
        DatabaseErrorConverter::convert_diesel_error(error, "database operation")
    }
}
