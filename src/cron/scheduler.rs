use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::cron::{CronError, CronResult, WATCH_JOB};
use crate::models::{CronConfig, JobType};

/// Invoked every time a scheduled config fires.
pub type TickHandler = Arc<dyn Fn(CronConfig) -> BoxFuture<'static, ()> + Send + Sync>;

/// Whether `config` belongs on a timer.
///
/// Only enabled, live method or query configs with a cron expression qualify;
/// query configs other than the watch job also need stored query text.
pub fn is_schedulable(config: &CronConfig) -> bool {
    let has_expression = config
        .cron_expression
        .as_deref()
        .is_some_and(|expr| !expr.trim().is_empty());
    let missing_query = config.job_type == JobType::Query
        && config.name != WATCH_JOB
        && config.query.as_deref().is_none_or(str::is_empty);

    config.enabled
        && !config.is_deleted()
        && has_expression
        && config.job_type.is_scheduled()
        && !missing_query
}

/// Rejects expressions the scheduler cannot parse.
pub fn validate_cron_expression(expr: &str) -> CronResult<()> {
    Job::new_async(expr, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|_| CronError::InvalidCronExpression(expr.to_string()))
}

/// Replica-local registry of running timers, keyed by job name.
pub struct CronScheduler {
    scheduler: Arc<Mutex<JobScheduler>>,
    entries: Mutex<HashMap<String, Uuid>>,
}

impl CronScheduler {
    pub async fn new() -> CronResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| CronError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub async fn start(&self) -> CronResult<()> {
        self.scheduler
            .lock()
            .await
            .start()
            .await
            .map_err(|e| CronError::Scheduler(e.to_string()))
    }

    pub async fn shutdown(&self) -> CronResult<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| CronError::Scheduler(e.to_string()))
    }

    /// Puts `config` on a timer, replacing any timer with the same name.
    ///
    /// Returns `false` without touching the registry when the config does not
    /// qualify for scheduling.
    pub async fn schedule_job(&self, config: CronConfig, on_tick: TickHandler) -> CronResult<bool> {
        if !is_schedulable(&config) {
            return Ok(false);
        }
        let expr = config.cron_expression.clone().unwrap_or_default();
        let name = config.name.clone();

        let job = Job::new_async(expr.as_str(), move |_uuid, _lock| {
            let on_tick = Arc::clone(&on_tick);
            let config = config.clone();
            Box::pin(async move { on_tick(config).await })
        })
        .map_err(|_| CronError::InvalidCronExpression(expr.clone()))?;

        let mut entries = self.entries.lock().await;
        let scheduler = self.scheduler.lock().await;

        if let Some(previous) = entries.remove(&name) {
            scheduler
                .remove(&previous)
                .await
                .map_err(|e| CronError::Scheduler(e.to_string()))?;
        }

        let id = scheduler
            .add(job)
            .await
            .map_err(|e| CronError::Scheduler(e.to_string()))?;
        entries.insert(name.clone(), id);

        if name != WATCH_JOB {
            tracing::info!(job = %name, cron = %expr, "Job: {} scheduled to run at {}", name, expr);
        }
        Ok(true)
    }

    /// Stops and forgets every timer. Returns the names that were scheduled.
    pub async fn unschedule_all(&self) -> CronResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        let scheduler = self.scheduler.lock().await;

        let mut names = Vec::with_capacity(entries.len());
        for (name, id) in entries.drain() {
            scheduler
                .remove(&id)
                .await
                .map_err(|e| CronError::Scheduler(e.to_string()))?;
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Sorted names of every scheduled job, the watch job included.
    pub async fn scheduled_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_scheduled(&self, name: &str) -> bool {
        self.entries.lock().await.contains_key(name)
    }
}
