use async_trait::async_trait;

use crate::cron::CronResult;
use crate::models::{CronConfig, CronJob, CronManagerControl, NewCronConfig, NewCronJob};

/// Lookup criteria for cron configs. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CronConfigFilter {
    pub id: Option<i32>,
    pub name: Option<String>,
    /// Soft-deleted configs are skipped unless set
    pub include_deleted: bool,
}

impl CronConfigFilter {
    pub fn by_id(id: i32) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, config: &CronConfig) -> bool {
        self.id.is_none_or(|id| config.id == id)
            && self.name.as_deref().is_none_or(|name| config.name == name)
            && (self.include_deleted || !config.is_deleted())
    }
}

/// Storage contract consumed by the coordination core.
#[async_trait]
pub trait DatabaseOps: Send + Sync {
    async fn find_one_cron_config(&self, filter: &CronConfigFilter)
    -> CronResult<Option<CronConfig>>;

    /// Configs ordered by id.
    async fn find_cron_config(&self, filter: Option<&CronConfigFilter>)
    -> CronResult<Vec<CronConfig>>;

    async fn create_cron_config(&self, data: NewCronConfig) -> CronResult<CronConfig>;

    async fn save_cron_config(&self, data: &CronConfig) -> CronResult<CronConfig>;

    async fn create_cron_job(&self, data: NewCronJob) -> CronResult<CronJob>;

    async fn save_cron_job(&self, data: &CronJob) -> CronResult<CronJob>;

    /// Runs raw SQL text. Non-relational backends return `CronError::Unsupported`.
    async fn query(&self, sql: &str) -> CronResult<serde_json::Value>;

    /// Creates the control row with `enabled = true` and `replica_id` as its
    /// only member.
    async fn create_control(&self, replica_id: &str) -> CronResult<CronManagerControl>;

    async fn get_control(&self) -> CronResult<Option<CronManagerControl>>;

    /// Writes `data` only if the stored `cmcv` still equals `data.cmcv`.
    ///
    /// On success the row gets a fresh `cmcv` and is returned. `None` means
    /// another writer got there first.
    async fn update_control(
        &self,
        data: &CronManagerControl,
    ) -> CronResult<Option<CronManagerControl>>;

    fn backend_name(&self) -> &'static str;
}
