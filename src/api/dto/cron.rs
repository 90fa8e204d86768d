use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::models::{CronConfig, JobType, NewCronConfig, UpdateCronConfig};

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCronConfigRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    pub job_type: JobType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub context: Option<JsonValue>,
    #[validate(length(min = 1, max = 255, message = "Cron expression must be between 1 and 255 characters"))]
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[validate(length(min = 1, message = "Query cannot be empty"))]
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub silent: bool,
}

impl CreateCronConfigRequest {
    pub fn into_new_cron_config(self) -> NewCronConfig {
        NewCronConfig {
            name: self.name,
            job_type: self.job_type,
            enabled: self.enabled,
            context: self.context,
            cron_expression: self.cron_expression,
            query: self.query,
            silent: self.silent,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCronConfigRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub job_type: Option<JobType>,
    pub enabled: Option<bool>,
    pub context: Option<JsonValue>,
    #[validate(length(min = 1, max = 255, message = "Cron expression must be between 1 and 255 characters"))]
    pub cron_expression: Option<String>,
    #[validate(length(min = 1, message = "Query cannot be empty"))]
    pub query: Option<String>,
    pub silent: Option<bool>,
}

impl UpdateCronConfigRequest {
    pub fn into_update_cron_config(self) -> UpdateCronConfig {
        UpdateCronConfig {
            name: self.name,
            job_type: self.job_type,
            enabled: self.enabled,
            context: self.context,
            cron_expression: self.cron_expression,
            query: self.query,
            silent: self.silent,
        }
    }
}

/// A config as returned by the API. Query text stays encrypted at rest and is
/// never echoed back.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronConfigResponse {
    pub id: i32,
    pub name: String,
    pub job_type: JobType,
    pub enabled: bool,
    pub context: Option<JsonValue>,
    pub cron_expression: Option<String>,
    pub has_query: bool,
    pub silent: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<CronConfig> for CronConfigResponse {
    fn from(config: CronConfig) -> Self {
        Self {
            id: config.id,
            name: config.name,
            job_type: config.job_type,
            enabled: config.enabled,
            context: config.context,
            cron_expression: config.cron_expression,
            has_query: config.query.is_some_and(|q| !q.is_empty()),
            silent: config.silent,
            created_at: config.created_at,
            updated_at: config.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateCronConfigRequest =
            serde_json::from_str(r#"{"name":"report","jobType":"method","cronExpression":"0 * * * * *"}"#)
                .unwrap();
        assert!(req.validate().is_ok());

        let data = req.into_new_cron_config();
        assert!(data.enabled);
        assert!(!data.silent);
        assert_eq!(data.job_type, JobType::Method);
    }

    #[test]
    fn test_create_request_rejects_empty_name() {
        let req: CreateCronConfigRequest =
            serde_json::from_str(r#"{"name":"","jobType":"inline"}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_update_request_keeps_absent_fields() {
        let req: UpdateCronConfigRequest = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
        let update = req.into_update_cron_config();
        assert_eq!(update.enabled, Some(false));
        assert!(update.name.is_none());
        assert!(update.cron_expression.is_none());
    }
}
