//! Runs one named job: start record, lock, execute, record outcome, release.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use jiff::Timestamp;
use uuid::Uuid;

use crate::cron::{CronResult, JobCallback, JobContext, JobOutput, JobStatus, Lens};
use crate::lock::{LockKeys, LockService};
use crate::models::{CronConfig, CronJob, NewCronJob};
use crate::repositories::{CronConfigFilter, DatabaseOps};

/// Result of an invocation that got past start and locking.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub status: JobStatus,
    pub config: CronConfig,
    /// Context the payload actually ran with
    pub context: JobContext,
}

#[derive(Debug)]
enum Hold {
    Unlocked,
    Exclusive { key: String, token: String },
    Batch { sequence: i64, size: i64 },
}

impl Hold {
    fn batch(&self) -> Option<i64> {
        match self {
            Hold::Batch { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}

pub struct JobExecutor {
    store: Arc<dyn DatabaseOps>,
    locks: Arc<dyn LockService>,
    keys: LockKeys,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn DatabaseOps>, locks: Arc<dyn LockService>, keys: LockKeys) -> Self {
        Self { store, locks, keys }
    }

    /// Executes `name` once with `callback` as its payload.
    ///
    /// Returns `None` when the job did not run: unknown, disabled or deleted
    /// config, lock held elsewhere, or an infrastructure error before the
    /// payload started. Payload errors and panics never escape; they end the
    /// run as [`JobStatus::Failed`]. The caller checks global enablement.
    pub async fn execute(&self, name: &str, callback: JobCallback) -> Option<JobRun> {
        match self.try_execute(name, callback).await {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(job = %name, error = %e, "Job: {}; Failed to start", name);
                None
            }
        }
    }

    async fn try_execute(&self, name: &str, callback: JobCallback) -> CronResult<Option<JobRun>> {
        let Some(config) = self
            .store
            .find_one_cron_config(&CronConfigFilter::by_name(name))
            .await?
        else {
            tracing::warn!(job = %name, "Job: {} not found", name);
            return Ok(None);
        };
        if !config.enabled || config.is_deleted() {
            tracing::debug!(job = %name, "Job: {} is disabled", name);
            return Ok(None);
        }

        let static_context = JobContext::from_value(config.context.as_ref())?;
        let persist = !config.silent && !static_context.dry_run;
        let mut record = if persist {
            Some(
                self.store
                    .create_cron_job(NewCronJob::starting_now(config.id))
                    .await?,
            )
        } else {
            None
        };

        let Some((context, hold)) = self.acquire(name, static_context).await? else {
            return Ok(None);
        };

        match hold.batch() {
            Some(batch) => tracing::info!(job = %name, batch, "Job: {}; Started - Success (Batch {})", name, batch),
            None => tracing::info!(job = %name, "Job: {}; Started - Success", name),
        }

        let lens = Lens::new();
        let (status, result) = run_payload(callback, context.clone(), lens).await;

        if let Some(job) = record.as_mut() {
            self.end_job(job, status, result).await;
        }

        self.release(name, &hold).await;
        match hold {
            Hold::Exclusive { .. } => tracing::info!(job = %name, %status, "Released lock for job: {}; Ended - {}", name, status),
            _ => tracing::info!(job = %name, %status, "Job: {}; Ended - {}", name, status),
        }

        Ok(Some(JobRun {
            status,
            config,
            context,
        }))
    }

    /// Resolves the effective context and takes the lock it asks for.
    async fn acquire(
        &self,
        name: &str,
        static_context: JobContext,
    ) -> CronResult<Option<(JobContext, Hold)>> {
        if !static_context.distributed {
            return Ok(Some((static_context, Hold::Unlocked)));
        }

        let context_key = self.keys.context(name);
        let mut context = match self.locks.get(&context_key).await? {
            Some(raw) => match serde_json::from_str::<JobContext>(&raw) {
                Ok(dynamic) => dynamic,
                Err(e) => {
                    tracing::warn!(job = %name, error = %e, "Ignoring unreadable dynamic context");
                    static_context
                }
            },
            None => {
                self.locks
                    .set(&context_key, &serde_json::to_string(&static_context)?)
                    .await?;
                static_context
            }
        };

        if context.concurrent {
            let sequence = self.locks.increment(&self.keys.batch(name)).await?;
            let size = context.batch_size();
            context.batch = Some(sequence);
            self.locks
                .set(&context_key, &serde_json::to_string(&context)?)
                .await?;
            tracing::debug!(job = %name, batch = sequence, "Joined batch {} of {}", sequence, size);
            return Ok(Some((context, Hold::Batch { sequence, size })));
        }

        let key = self.keys.lock(name);
        let token = Uuid::new_v4().to_string();
        let attempts = context.lock_attempts();
        let ttl_ms = context.lock_ttl_ms();
        let retry_delay = context.lock_retry_delay();

        for attempt in 1..=attempts {
            if self.locks.set_if_absent(&key, &token, ttl_ms).await? {
                tracing::debug!(job = %name, attempt, "Acquired lock for job: {} on attempt {}", name, attempt);
                return Ok(Some((context, Hold::Exclusive { key, token })));
            }
            if attempt < attempts {
                tracing::debug!(
                    job = %name,
                    attempt,
                    "Job: {}; Lock acquisition attempt {} failed. Retrying in {}s...",
                    name,
                    attempt,
                    retry_delay.as_secs()
                );
                tokio::time::sleep(retry_delay).await;
            }
        }

        tracing::debug!(job = %name, "Failed to acquire lock for job: {} after {} attempts", name, attempts);
        Ok(None)
    }

    async fn release(&self, name: &str, hold: &Hold) {
        let outcome = match hold {
            Hold::Unlocked => Ok(()),
            Hold::Exclusive { key, token } => {
                match self.locks.compare_and_delete(key, token).await {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        tracing::debug!(job = %name, "Lock expired before release");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Hold::Batch { sequence, size } if sequence >= size => {
                let cleared = self.locks.delete(&self.keys.batch(name)).await;
                match cleared {
                    Ok(()) => self.locks.delete(&self.keys.context(name)).await,
                    Err(e) => Err(e),
                }
            }
            Hold::Batch { .. } => Ok(()),
        };

        if let Err(e) = outcome {
            tracing::warn!(job = %name, error = %e, "Failed to release lock");
        }
    }

    async fn end_job(&self, job: &mut CronJob, status: JobStatus, result: Option<String>) {
        let now = Timestamp::now();
        job.completed_at = (status == JobStatus::Success).then_some(now);
        job.failed_at = (status == JobStatus::Failed).then_some(now);
        job.result = result;

        if let Err(e) = self.store.save_cron_job(job).await {
            tracing::warn!(job_id = job.id, error = %e, "Failed to record job result");
        }
    }
}

async fn run_payload(callback: JobCallback, context: JobContext, lens: Lens) -> (JobStatus, Option<String>) {
    let trace = lens.clone();
    let outcome = AssertUnwindSafe(async move { callback(context, lens).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(output)) => (JobStatus::Success, serialize_output(output, &trace)),
        Ok(Err(e)) => {
            trace.capture("Error", e.to_string());
            (JobStatus::Failed, Some(trace.to_json()))
        }
        Err(panic) => {
            trace.capture("Error", panic_message(panic.as_ref()));
            (JobStatus::Failed, Some(trace.to_json()))
        }
    }
}

/// Converts a payload's return value into the stored `result` text.
///
/// Valid JSON text is kept as is, other text is stored as a JSON string.
/// Without a return value the captured frames become the result.
///
/// Used for every job type, not only method jobs. Query and inline payloads
/// return `Json` or `Empty`, for which the conversion stores the value as is.
pub fn serialize_output(output: JobOutput, lens: &Lens) -> Option<String> {
    match output {
        JobOutput::Trace(trace) => Some(trace.to_json()),
        JobOutput::Json(value) => Some(value.to_string()),
        JobOutput::Text(text) if !text.is_empty() => {
            if serde_json::from_str::<serde_json::Value>(&text).is_ok() {
                Some(text)
            } else {
                Some(serde_json::Value::String(text).to_string())
            }
        }
        JobOutput::Text(_) | JobOutput::Empty => (!lens.is_empty()).then(|| lens.to_json()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::job_callback;
    use crate::lock::MemoryLockService;
    use crate::models::{JobType, NewCronConfig};
    use crate::repositories::MemoryOperations;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        store: Arc<MemoryOperations>,
        locks: Arc<MemoryLockService>,
        executor: JobExecutor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryOperations::new());
        let locks = Arc::new(MemoryLockService::new());
        let executor = JobExecutor::new(store.clone(), locks.clone(), LockKeys::new("test"));
        Fixture {
            store,
            locks,
            executor,
        }
    }

    async fn create(store: &MemoryOperations, name: &str, context: serde_json::Value, silent: bool) -> CronConfig {
        store
            .create_cron_config(NewCronConfig {
                name: name.to_string(),
                job_type: JobType::Method,
                enabled: true,
                context: Some(context),
                cron_expression: Some("*/5 * * * * *".to_string()),
                query: None,
                silent,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_serialize_output() {
        let empty = Lens::new();
        assert_eq!(serialize_output(JobOutput::Empty, &empty), None);
        assert_eq!(
            serialize_output(JobOutput::Text("{\"a\":1}".into()), &empty).as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(
            serialize_output(JobOutput::Text("plain".into()), &empty).as_deref(),
            Some("\"plain\"")
        );
        assert_eq!(
            serialize_output(JobOutput::Json(json!({"rows": 2})), &empty).as_deref(),
            Some("{\"rows\":2}")
        );

        let lens = Lens::new();
        lens.capture("step", "one");
        assert_eq!(
            serialize_output(JobOutput::Empty, &lens).as_deref(),
            Some(r#"[{"title":"step","message":"one"}]"#)
        );
        assert_eq!(
            serialize_output(JobOutput::Trace(lens.clone()), &empty),
            Some(lens.to_json())
        );
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let f = fixture();
        let config = create(&f.store, "report", json!({}), false).await;

        let run = f
            .executor
            .execute(
                "report",
                job_callback(|_ctx, _lens| async { Ok::<_, anyhow::Error>(json!({"ok": true})) }),
            )
            .await
            .unwrap();
        assert_eq!(run.status, JobStatus::Success);

        let jobs = f.store.cron_jobs(config.id).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].completed_at.is_some());
        assert!(jobs[0].failed_at.is_none());
        assert_eq!(jobs[0].result.as_deref(), Some("{\"ok\":true}"));
    }

    #[tokio::test]
    async fn test_failure_is_captured_in_trace() {
        let f = fixture();
        let config = create(&f.store, "report", json!({}), false).await;

        let run = f
            .executor
            .execute(
                "report",
                job_callback(|_ctx, lens: Lens| async move {
                    lens.capture("fetch", "started");
                    Err::<(), _>(anyhow::anyhow!("upstream timed out"))
                }),
            )
            .await
            .unwrap();
        assert_eq!(run.status, JobStatus::Failed);

        let job = &f.store.cron_jobs(config.id).unwrap()[0];
        assert!(job.failed_at.is_some());
        assert!(job.completed_at.is_none());
        let frames: serde_json::Value = serde_json::from_str(job.result.as_deref().unwrap()).unwrap();
        assert_eq!(frames[0]["title"], "fetch");
        assert_eq!(frames[1]["title"], "Error");
        assert_eq!(frames[1]["message"], "upstream timed out");
    }

    #[tokio::test]
    async fn test_panic_is_a_failure() {
        let f = fixture();
        create(&f.store, "report", json!({}), false).await;

        let run = f
            .executor
            .execute(
                "report",
                job_callback(|_ctx, _lens| async {
                    if true {
                        panic!("bad state");
                    }
                    Ok::<_, anyhow::Error>(())
                }),
            )
            .await
            .unwrap();
        assert_eq!(run.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_silent_and_dry_run_skip_history() {
        let f = fixture();
        let silent = create(&f.store, "silent", json!({}), true).await;
        let dry = create(&f.store, "dry", json!({"dryRun": true}), false).await;
        let calls = Arc::new(AtomicUsize::new(0));

        for name in ["silent", "dry"] {
            let calls = calls.clone();
            let run = f
                .executor
                .execute(
                    name,
                    job_callback(move |_ctx, _lens| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, anyhow::Error>(())
                        }
                    }),
                )
                .await;
            assert_eq!(run.map(|r| r.status), Some(JobStatus::Success));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(f.store.cron_jobs(silent.id).unwrap().is_empty());
        assert!(f.store.cron_jobs(dry.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_or_unknown_job_does_not_run() {
        let f = fixture();
        let mut config = create(&f.store, "report", json!({}), false).await;
        config.enabled = false;
        f.store.save_cron_config(&config).await.unwrap();

        let noop = job_callback(|_ctx, _lens| async { Ok::<_, anyhow::Error>(()) });
        assert!(f.executor.execute("report", noop.clone()).await.is_none());
        assert!(f.executor.execute("missing", noop).await.is_none());
        assert!(f.store.cron_jobs(config.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exclusive_lock_held_elsewhere_skips_run() {
        let f = fixture();
        create(&f.store, "report", json!({"distributed": true, "maxRetries": 1}), false).await;
        f.locks
            .set_if_absent("test:lock:report", "other-replica", 60_000)
            .await
            .unwrap();

        let run = f
            .executor
            .execute("report", job_callback(|_ctx, _lens| async { Ok::<_, anyhow::Error>(()) }))
            .await;
        assert!(run.is_none());
        assert_eq!(
            f.locks.get("test:lock:report").await.unwrap().as_deref(),
            Some("other-replica")
        );
    }

    #[tokio::test]
    async fn test_exclusive_lock_is_released_after_run() {
        let f = fixture();
        create(&f.store, "report", json!({"distributed": true}), false).await;

        let locks = f.locks.clone();
        let run = f
            .executor
            .execute(
                "report",
                job_callback(move |_ctx, _lens| {
                    let locks = locks.clone();
                    async move {
                        let held = locks.get("test:lock:report").await?;
                        Ok::<_, anyhow::Error>(JobOutput::Text(held.unwrap_or_default()))
                    }
                }),
            )
            .await
            .unwrap();

        assert_eq!(run.status, JobStatus::Success);
        assert_eq!(f.locks.get("test:lock:report").await.unwrap(), None);
        // static context is seeded as the dynamic context
        assert!(f.locks.get("test:context:report").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oversized_ttl_still_runs_and_records() {
        let f = fixture();
        let config = create(
            &f.store,
            "report",
            json!({"distributed": true, "ttl": 1844674407370955161u64}),
            false,
        )
        .await;

        let run = f
            .executor
            .execute(
                "report",
                job_callback(|_ctx, _lens| async { Ok::<_, anyhow::Error>(JobOutput::Empty) }),
            )
            .await
            .unwrap();

        assert_eq!(run.status, JobStatus::Success);
        let jobs = f.store.cron_jobs(config.id).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].completed_at.is_some());
        assert_eq!(f.locks.get("test:lock:report").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_replicas_run_exclusive_job_once() {
        let f = fixture();
        create(&f.store, "report", json!({"distributed": true, "maxRetries": 1}), false).await;
        let executor = Arc::new(f.executor);
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let executor = executor.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                executor
                    .execute(
                        "report",
                        job_callback(move |_ctx, _lens| {
                            let runs = runs.clone();
                            async move {
                                runs.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                                Ok::<_, anyhow::Error>(())
                            }
                        }),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_members_get_sequence_and_last_clears() {
        let f = fixture();
        create(
            &f.store,
            "sync",
            json!({"distributed": true, "concurrent": true, "replicas": 2}),
            false,
        )
        .await;

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        for _ in 0..2 {
            let seen = seen.clone();
            let run = f
                .executor
                .execute(
                    "sync",
                    job_callback(move |ctx: JobContext, _lens| {
                        let seen = seen.clone();
                        async move {
                            seen.lock().unwrap().push(ctx.batch);
                            Ok::<_, anyhow::Error>(())
                        }
                    }),
                )
                .await
                .unwrap();
            assert_eq!(run.status, JobStatus::Success);
        }

        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2)]);
        assert_eq!(f.locks.get("test:batch:sync").await.unwrap(), None);
        assert_eq!(f.locks.get("test:context:sync").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dynamic_context_overrides_static() {
        let f = fixture();
        create(&f.store, "report", json!({"distributed": true, "region": "eu"}), false).await;
        f.locks
            .set("test:context:report", r#"{"distributed":true,"region":"us"}"#)
            .await
            .unwrap();

        let run = f
            .executor
            .execute("report", job_callback(|_ctx, _lens| async { Ok::<_, anyhow::Error>(()) }))
            .await
            .unwrap();
        assert_eq!(run.context.extra.get("region"), Some(&json!("us")));
    }
}
