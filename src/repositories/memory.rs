//! In-process document store.
//!
//! Behaves like the document backend: no raw queries, ids assigned on insert,
//! unique names enforced. Several managers can share one instance to act as
//! replicas of the same deployment.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use jiff::Timestamp;
use uuid::Uuid;

use crate::cron::{CronError, CronResult};
use crate::models::{CronConfig, CronJob, CronManagerControl, NewCronConfig, NewCronJob};
use crate::repositories::{CronConfigFilter, DatabaseOps};

#[derive(Debug, Default)]
struct Collections {
    configs: BTreeMap<i32, CronConfig>,
    jobs: BTreeMap<i32, CronJob>,
    controls: BTreeMap<i32, CronManagerControl>,
    next_id: i32,
}

impl Collections {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_unique_name(&self, name: &str, except: Option<i32>) -> CronResult<()> {
        let taken = self
            .configs
            .values()
            .any(|c| c.name == name && Some(c.id) != except);
        if taken {
            return Err(CronError::Duplicate {
                field: "name".to_string(),
                value: name.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryOperations {
    inner: Mutex<Collections>,
}

impl MemoryOperations {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CronResult<std::sync::MutexGuard<'_, Collections>> {
        self.inner
            .lock()
            .map_err(|e| CronError::database("lock memory store", anyhow::anyhow!(e.to_string())))
    }

    /// Execution history of one config, oldest first.
    pub fn cron_jobs(&self, config_id: i32) -> CronResult<Vec<CronJob>> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|job| job.config_id == config_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DatabaseOps for MemoryOperations {
    async fn find_one_cron_config(
        &self,
        filter: &CronConfigFilter,
    ) -> CronResult<Option<CronConfig>> {
        Ok(self
            .lock()?
            .configs
            .values()
            .find(|c| filter.matches(c))
            .cloned())
    }

    async fn find_cron_config(
        &self,
        filter: Option<&CronConfigFilter>,
    ) -> CronResult<Vec<CronConfig>> {
        let default_filter = CronConfigFilter::default();
        let filter = filter.unwrap_or(&default_filter);
        Ok(self
            .lock()?
            .configs
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn create_cron_config(&self, data: NewCronConfig) -> CronResult<CronConfig> {
        let mut store = self.lock()?;
        store.ensure_unique_name(&data.name, None)?;

        let now = Timestamp::now();
        let config = CronConfig {
            id: store.next_id(),
            name: data.name,
            job_type: data.job_type,
            enabled: data.enabled,
            context: data.context,
            cron_expression: data.cron_expression,
            query: data.query,
            silent: data.silent,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        store.configs.insert(config.id, config.clone());
        Ok(config)
    }

    async fn save_cron_config(&self, data: &CronConfig) -> CronResult<CronConfig> {
        let mut store = self.lock()?;
        if !store.configs.contains_key(&data.id) {
            return Err(CronError::NotFound(data.id.to_string()));
        }
        store.ensure_unique_name(&data.name, Some(data.id))?;

        let mut saved = data.clone();
        saved.updated_at = Timestamp::now();
        store.configs.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn create_cron_job(&self, data: NewCronJob) -> CronResult<CronJob> {
        let mut store = self.lock()?;
        if !store.configs.contains_key(&data.config_id) {
            return Err(CronError::NotFound(data.config_id.to_string()));
        }

        let job = CronJob {
            id: store.next_id(),
            config_id: data.config_id,
            result: None,
            started_at: data.started_at,
            completed_at: None,
            failed_at: None,
        };
        store.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn save_cron_job(&self, data: &CronJob) -> CronResult<CronJob> {
        let mut store = self.lock()?;
        if !store.jobs.contains_key(&data.id) {
            return Err(CronError::NotFound(data.id.to_string()));
        }
        store.jobs.insert(data.id, data.clone());
        Ok(data.clone())
    }

    async fn query(&self, _sql: &str) -> CronResult<serde_json::Value> {
        Err(CronError::Unsupported {
            backend: self.backend_name(),
            operation: "query",
        })
    }

    async fn create_control(&self, replica_id: &str) -> CronResult<CronManagerControl> {
        let mut store = self.lock()?;
        let now = Timestamp::now();
        let control = CronManagerControl {
            id: store.next_id(),
            enabled: true,
            replica_ids: vec![replica_id.to_string()],
            stale_replicas: Vec::new(),
            cmcv: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        store.controls.insert(control.id, control.clone());
        Ok(control)
    }

    async fn get_control(&self) -> CronResult<Option<CronManagerControl>> {
        Ok(self.lock()?.controls.values().next_back().cloned())
    }

    async fn update_control(
        &self,
        data: &CronManagerControl,
    ) -> CronResult<Option<CronManagerControl>> {
        let mut store = self.lock()?;
        let Some(current) = store.controls.get_mut(&data.id) else {
            return Ok(None);
        };
        if current.cmcv != data.cmcv {
            return Ok(None);
        }

        current.enabled = data.enabled;
        current.replica_ids = data.replica_ids.clone();
        current.stale_replicas = data.stale_replicas.clone();
        current.cmcv = Uuid::new_v4();
        current.updated_at = Timestamp::now();
        Ok(Some(current.clone()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobType;

    fn new_config(name: &str) -> NewCronConfig {
        NewCronConfig {
            name: name.to_string(),
            job_type: JobType::Method,
            enabled: true,
            context: None,
            cron_expression: Some("*/5 * * * * *".to_string()),
            query: None,
            silent: false,
        }
    }

    #[tokio::test]
    async fn test_unique_names() {
        let db = MemoryOperations::new();
        db.create_cron_config(new_config("report")).await.unwrap();
        let err = db.create_cron_config(new_config("report")).await.unwrap_err();
        assert!(matches!(err, CronError::Duplicate { ref value, .. } if value == "report"));
    }

    #[tokio::test]
    async fn test_soft_deleted_hidden_by_default() {
        let db = MemoryOperations::new();
        let mut config = db.create_cron_config(new_config("old")).await.unwrap();
        config.deleted_at = Some(Timestamp::now());
        db.save_cron_config(&config).await.unwrap();

        assert!(db.find_cron_config(None).await.unwrap().is_empty());
        let all = CronConfigFilter {
            include_deleted: true,
            ..Default::default()
        };
        assert_eq!(db.find_cron_config(Some(&all)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_control_is_conditional() {
        let db = MemoryOperations::new();
        let control = db.create_control("a").await.unwrap();
        assert!(control.enabled);

        let mut first = control.clone();
        first.add_replica("b");
        let updated = db.update_control(&first).await.unwrap().unwrap();
        assert_ne!(updated.cmcv, control.cmcv);

        let mut stale_write = control.clone();
        stale_write.add_replica("c");
        assert!(db.update_control(&stale_write).await.unwrap().is_none());

        let stored = db.get_control().await.unwrap().unwrap();
        assert_eq!(stored.replica_ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_query_is_unsupported() {
        let db = MemoryOperations::new();
        let err = db.query("SELECT 1").await.unwrap_err();
        assert!(matches!(err, CronError::Unsupported { backend: "memory", .. }));
    }

    #[tokio::test]
    async fn test_job_history() {
        let db = MemoryOperations::new();
        let config = db.create_cron_config(new_config("report")).await.unwrap();
        let mut job = db
            .create_cron_job(NewCronJob::starting_now(config.id))
            .await
            .unwrap();
        job.completed_at = Some(Timestamp::now());
        db.save_cron_job(&job).await.unwrap();

        let jobs = db.cron_jobs(config.id).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].is_finished());
    }
}
