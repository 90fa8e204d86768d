//! The per-replica entry point: control API, job handling and lifecycle.

use std::sync::{Arc, Weak};

use serde::Serialize;

use crate::config::settings::CronSettings;
use crate::cron::control::{ControlManager, RetryPolicy};
use crate::cron::executor::JobExecutor;
use crate::cron::interval::interval_to_cron;
use crate::cron::scheduler::{CronScheduler, validate_cron_expression};
use crate::cron::{
    CronError, CronResult, JobCallback, JobOutput, JobPayload, JobStatus, MethodRegistry,
    QueryCipher, WATCH_JOB, job_callback,
};
use crate::lock::{LockKeys, LockService};
use crate::models::{CronConfig, CronManagerControl, NewCronConfig, UpdateCronConfig};
use crate::repositories::{CronConfigFilter, DatabaseOps};

/// Construction-time settings of one replica.
#[derive(Debug, Clone)]
pub struct CronManagerOptions {
    pub replica_id: String,
    /// Local switch; a disabled replica schedules nothing
    pub enabled: bool,
    /// Watch interval such as `"5s"`
    pub watch_time: String,
    pub query_secret: Option<String>,
    pub release_locks_on_shutdown: bool,
    pub lock_prefix: String,
    pub retry: RetryPolicy,
}

impl CronManagerOptions {
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self {
            replica_id: replica_id.into(),
            enabled: true,
            watch_time: "5s".to_string(),
            query_secret: None,
            release_locks_on_shutdown: false,
            lock_prefix: "cronmesh".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&CronSettings> for CronManagerOptions {
    fn from(settings: &CronSettings) -> Self {
        Self {
            replica_id: settings.resolved_replica_id(),
            enabled: settings.enabled,
            watch_time: settings.watch_time.clone(),
            query_secret: settings.query_secret.clone(),
            release_locks_on_shutdown: settings.release_locks_on_shutdown,
            lock_prefix: settings.lock_prefix.clone(),
            retry: RetryPolicy::default(),
        }
    }
}

/// One dependency reported by [`CronManager::check_init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitStatus {
    pub name: &'static str,
    pub status: String,
}

/// Coordinates one replica with the rest of the deployment.
pub struct CronManager {
    pub(super) options: CronManagerOptions,
    pub(super) watch_cron: String,
    pub(super) store: Arc<dyn DatabaseOps>,
    pub(super) locks: Arc<dyn LockService>,
    pub(super) keys: LockKeys,
    pub(super) control: ControlManager,
    pub(super) scheduler: CronScheduler,
    pub(super) executor: JobExecutor,
    pub(super) methods: MethodRegistry,
    pub(super) cipher: QueryCipher,
    pub(super) this: Weak<CronManager>,
}

impl CronManager {
    pub async fn new(
        options: CronManagerOptions,
        store: Arc<dyn DatabaseOps>,
        locks: Arc<dyn LockService>,
        methods: MethodRegistry,
    ) -> CronResult<Arc<Self>> {
        let scheduler = CronScheduler::new().await?;
        let keys = LockKeys::new(options.lock_prefix.clone());
        let watch_cron = interval_to_cron(&options.watch_time);
        let control = ControlManager::new(store.clone(), options.replica_id.clone(), options.retry);
        let executor = JobExecutor::new(store.clone(), locks.clone(), keys.clone());
        let cipher = QueryCipher::new(options.query_secret.as_deref());

        Ok(Arc::new_cyclic(|this| Self {
            options,
            watch_cron,
            store,
            locks,
            keys,
            control,
            scheduler,
            executor,
            methods,
            cipher,
            this: this.clone(),
        }))
    }

    pub fn replica_id(&self) -> &str {
        &self.options.replica_id
    }

    /// Cron expression of the watch job.
    pub fn watch_cron(&self) -> &str {
        &self.watch_cron
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn is_globally_enabled(&self) -> bool {
        self.control.is_globally_enabled().await
    }

    /// Names currently on a timer in this replica, the watch job included.
    pub async fn scheduled_jobs(&self) -> Vec<String> {
        self.scheduler.scheduled_names().await
    }

    /// Starts the timers and joins the deployment.
    pub async fn start(&self) -> CronResult<()> {
        self.scheduler.start().await?;
        self.prepare().await?;
        tracing::info!(replica_id = %self.replica_id(), "Initialized w/ replicaId: {}", self.replica_id());
        Ok(())
    }

    /// Stops every timer, optionally drops held locks, then stops the scheduler.
    pub async fn shutdown(&self) -> CronResult<()> {
        for name in self.scheduler.unschedule_all().await? {
            tracing::info!(job = %name, "Job: {} stopped", name);
        }

        if self.options.release_locks_on_shutdown {
            match self.locks.delete_by_prefix(&self.keys.all_locks()).await {
                Ok(count) => tracing::info!(count, "Released {} lock(s)", count),
                Err(e) => tracing::error!(error = %e, "Failed to release locks during shutdown"),
            }
        }

        self.scheduler.shutdown().await?;
        tracing::info!("All jobs stopped, locks released (if configured), and resources cleaned up successfully");
        Ok(())
    }

    async fn ensure_enabled(&self, operation: &'static str) -> CronResult<()> {
        if self.control.is_globally_enabled().await {
            return Ok(());
        }
        tracing::info!(operation, "Cron manager is disabled");
        Err(CronError::Disabled)
    }

    async fn find_by_id(&self, id: i32) -> CronResult<CronConfig> {
        self.store
            .find_one_cron_config(&CronConfigFilter::by_id(id))
            .await?
            .ok_or_else(|| CronError::NotFound(id.to_string()))
    }

    /// Broadcast failures are logged; the next watch cycle re-evaluates.
    async fn broadcast(&self) {
        if let Err(e) = self.control.mark_all_stale().await {
            tracing::warn!(error = %e, "Failed to expire jobs");
        }
    }

    // ------------------------------------------------------------------
    // Control API
    // ------------------------------------------------------------------

    pub async fn create_cron_config(&self, mut data: NewCronConfig) -> CronResult<CronConfig> {
        self.ensure_enabled("create cron config").await?;

        if let Some(expr) = data.cron_expression.as_deref() {
            validate_cron_expression(expr)?;
        }
        if let Some(query) = data.query.as_deref() {
            data.query = Some(self.cipher.encrypt(query)?);
        }
        if data.name == WATCH_JOB {
            data.enabled = true;
        }

        let config = self.store.create_cron_config(data).await?;
        tracing::info!(job = %config.name, "Job: {} created", config.name);

        if config.job_type.is_scheduled() {
            self.broadcast().await;
        }
        Ok(config)
    }

    pub async fn update_cron_config(
        &self,
        id: i32,
        mut changes: UpdateCronConfig,
    ) -> CronResult<CronConfig> {
        self.ensure_enabled("update cron config").await?;

        let mut config = self.find_by_id(id).await?;
        if config.name == WATCH_JOB {
            return Err(CronError::ReservedWatchJob("update"));
        }
        if changes.name.as_deref() == Some(WATCH_JOB) {
            return Err(CronError::Duplicate {
                field: "name".to_string(),
                value: WATCH_JOB.to_string(),
            });
        }
        if let Some(expr) = changes.cron_expression.as_deref() {
            validate_cron_expression(expr)?;
        }
        if let Some(query) = changes.query.as_deref() {
            changes.query = Some(self.cipher.encrypt(query)?);
        }
        if let Some(context) = changes.context.as_ref() {
            self.locks
                .set(&self.keys.context(&config.name), &context.to_string())
                .await?;
        }

        let was_scheduled = config.job_type.is_scheduled();
        config.apply(changes);
        let config = self.store.save_cron_config(&config).await?;
        tracing::info!(job = %config.name, "Job: {} updated", config.name);

        if was_scheduled || config.job_type.is_scheduled() {
            self.broadcast().await;
        }
        Ok(config)
    }

    /// Every live config except the watch job.
    pub async fn list_cron_config(&self) -> CronResult<Vec<CronConfig>> {
        let configs = self.store.find_cron_config(None).await?;
        Ok(configs.into_iter().filter(|c| c.name != WATCH_JOB).collect())
    }

    pub async fn toggle_cron_config(&self, id: i32) -> CronResult<CronConfig> {
        self.ensure_enabled("toggle cron config").await?;

        let mut config = self.find_by_id(id).await?;
        if config.name == WATCH_JOB {
            return Err(CronError::ReservedWatchJob("toggle"));
        }

        config.enabled = !config.enabled;
        let config = self.store.save_cron_config(&config).await?;
        tracing::info!(
            job = %config.name,
            enabled = config.enabled,
            "Job: {} {}",
            config.name,
            if config.enabled { "enabled" } else { "disabled" }
        );

        self.broadcast().await;
        Ok(config)
    }

    pub async fn enable_all_cron_config(&self) -> CronResult<Vec<CronConfig>> {
        self.set_all_enabled(true).await
    }

    /// Disables every config except the watch job.
    pub async fn disable_all_cron_config(&self) -> CronResult<Vec<CronConfig>> {
        self.set_all_enabled(false).await
    }

    async fn set_all_enabled(&self, enabled: bool) -> CronResult<Vec<CronConfig>> {
        self.ensure_enabled(if enabled { "enable all" } else { "disable all" })
            .await?;

        let mut result = Vec::new();
        for mut config in self.store.find_cron_config(None).await? {
            if config.name == WATCH_JOB {
                continue;
            }
            if config.enabled != enabled {
                config.enabled = enabled;
                config = self.store.save_cron_config(&config).await?;
                tracing::info!(
                    job = %config.name,
                    "Job: {} {}",
                    config.name,
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            result.push(config);
        }

        self.broadcast().await;
        Ok(result)
    }

    pub async fn get_control(&self) -> CronResult<Option<CronManagerControl>> {
        self.control.get().await
    }

    /// Forgets every replica, then rejoins with this one.
    ///
    /// Returns `false` when the purge lost every retry against concurrent writers.
    pub async fn purge_control(&self) -> CronResult<bool> {
        if self.control.purge().await?.is_none() {
            return Ok(false);
        }
        self.prepare().await?;
        Ok(true)
    }

    /// Flips the global switch and returns its new value.
    pub async fn toggle_control(&self) -> CronResult<bool> {
        let enabled = match self.control.toggle().await? {
            Some(control) => control.enabled,
            None => self.control.is_globally_enabled().await,
        };
        tracing::info!(enabled, "Cron manager is {}", if enabled { "enabled" } else { "disabled" });
        Ok(enabled)
    }

    /// Reports what this replica was constructed with.
    pub fn check_init(&self) -> Vec<InitStatus> {
        let ok = |present: bool| (if present { "OK" } else { "Not Found" }).to_string();
        vec![
            InitStatus {
                name: "replicaId",
                status: if self.options.replica_id.is_empty() {
                    "Not Found".to_string()
                } else {
                    self.options.replica_id.clone()
                },
            },
            InitStatus {
                name: "store",
                status: self.store.backend_name().to_string(),
            },
            InitStatus {
                name: "lockService",
                status: "OK".to_string(),
            },
            InitStatus {
                name: "methods",
                status: format!("{} registered", self.methods.len()),
            },
            InitStatus {
                name: "enabled",
                status: ok(self.options.enabled),
            },
            InitStatus {
                name: "watchTime",
                status: ok(!self.watch_cron.is_empty()),
            },
            InitStatus {
                name: "querySecret",
                status: ok(self.cipher.is_configured()),
            },
        ]
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Runs the job `name` once with the given payload.
    ///
    /// A pure no-op while the deployment is globally disabled. Returns the
    /// outcome, or `None` when the job did not run.
    pub async fn handle_job(&self, name: &str, payload: JobPayload) -> Option<JobStatus> {
        if !self.control.is_globally_enabled().await {
            tracing::debug!(job = %name, "Cron manager is disabled");
            return None;
        }

        let callback = match self.resolve(name, payload) {
            Ok(callback) => callback,
            Err(e) => {
                tracing::warn!(job = %name, error = %e, "Job: {}; {}", name, e);
                return None;
            }
        };

        let run = self.executor.execute(name, callback).await?;

        if run.status == JobStatus::Success && run.context.run_once {
            let disable = UpdateCronConfig {
                enabled: Some(false),
                ..Default::default()
            };
            if let Err(e) = self.update_cron_config(run.config.id, disable).await {
                tracing::warn!(job = %name, error = %e, "Failed to disable run-once job");
            }
        }
        Some(run.status)
    }

    fn resolve(&self, name: &str, payload: JobPayload) -> CronResult<JobCallback> {
        match payload {
            JobPayload::Inline(callback) => Ok(callback),
            JobPayload::Method(method) => self
                .methods
                .get(&method)
                .ok_or_else(|| CronError::NotFound(format!("method {}", method))),
            JobPayload::Query(ciphertext) => {
                if ciphertext.is_empty() {
                    return Err(CronError::NotFound(format!("query for {}", name)));
                }
                let sql = self.cipher.decrypt(&ciphertext)?;
                let store = self.store.clone();
                Ok(job_callback(move |_ctx, _lens| {
                    let store = store.clone();
                    let sql = sql.clone();
                    async move { Ok::<_, anyhow::Error>(JobOutput::Json(store.query(&sql).await?)) }
                }))
            }
        }
    }
}
