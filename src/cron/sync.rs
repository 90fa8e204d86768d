//! Keeps this replica's timers in line with the shared configuration.
//!
//! Schedule changes mark every replica stale on the control row. Each replica
//! runs the watch job every few seconds; a stale replica rebuilds all of its
//! timers from the database and then removes itself from the stale set.

use std::sync::Arc;

use crate::cron::scheduler::TickHandler;
use crate::cron::{CronError, CronManager, CronResult, JobPayload, WATCH_JOB};
use crate::models::{CronConfig, CronManagerControl, JobType, NewCronConfig};
use crate::repositories::CronConfigFilter;

impl CronManager {
    /// Startup sequence: join the control row, make sure the watch config
    /// exists with this replica's interval, then build the schedule.
    pub async fn prepare(&self) -> CronResult<()> {
        self.control.ensure_control().await?;
        self.ensure_watch_config().await?;
        self.rebuild_schedule().await?;
        Ok(())
    }

    async fn ensure_watch_config(&self) -> CronResult<CronConfig> {
        let filter = CronConfigFilter {
            include_deleted: true,
            ..CronConfigFilter::by_name(WATCH_JOB)
        };

        if let Some(mut watch) = self.store.find_one_cron_config(&filter).await? {
            let expected = Some(self.watch_cron.clone());
            let current = watch.cron_expression == expected
                && watch.enabled
                && watch.silent
                && !watch.is_deleted()
                && watch.job_type == JobType::Query;
            if current {
                return Ok(watch);
            }
            watch.cron_expression = expected;
            watch.enabled = true;
            watch.silent = true;
            watch.deleted_at = None;
            watch.job_type = JobType::Query;
            return self.store.save_cron_config(&watch).await;
        }

        let created = self
            .store
            .create_cron_config(NewCronConfig {
                name: WATCH_JOB.to_string(),
                job_type: JobType::Query,
                enabled: true,
                context: None,
                cron_expression: Some(self.watch_cron.clone()),
                query: None,
                silent: true,
            })
            .await;

        match created {
            Ok(watch) => Ok(watch),
            // another replica created it first
            Err(CronError::Duplicate { .. }) => self
                .store
                .find_one_cron_config(&filter)
                .await?
                .ok_or_else(|| CronError::NotFound(WATCH_JOB.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Drops every timer and schedules the current configuration again.
    ///
    /// A locally disabled replica schedules nothing. While the deployment is
    /// globally disabled only the watch job is kept so that re-enabling
    /// reaches this replica. Returns the number of scheduled non-watch jobs.
    pub async fn rebuild_schedule(&self) -> CronResult<usize> {
        self.scheduler.unschedule_all().await?;

        if !self.options.enabled {
            tracing::info!(replica_id = %self.replica_id(), "Cron manager is disabled on this replica");
            return Ok(0);
        }

        let globally_enabled = self.control.is_globally_enabled().await;
        if !globally_enabled {
            tracing::warn!("Cron manager is disabled");
        }

        let on_tick = self.tick_handler();
        let mut scheduled = 0;
        for config in self.store.find_cron_config(None).await? {
            let is_watch = config.name == WATCH_JOB;
            if !is_watch && !globally_enabled {
                continue;
            }

            let name = config.name.clone();
            match self.scheduler.schedule_job(config, on_tick.clone()).await {
                Ok(true) if !is_watch => scheduled += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!(job = %name, error = %e, "Failed to schedule job"),
            }
        }

        tracing::info!(count = scheduled, "Total jobs scheduled: {}", scheduled);
        Ok(scheduled)
    }

    /// One firing of the watch job.
    pub async fn watch_cycle(&self) -> CronResult<()> {
        if !self.control.is_globally_enabled().await {
            return Ok(());
        }

        let Some(mut control) = self.control.get().await? else {
            return Err(CronError::ControlMissing);
        };

        let replica_id = self.replica_id();
        if !control.has_replica(replica_id) {
            tracing::info!(replica_id = %replica_id, "Replica not registered; joining as stale");
            control = match self.control.register_stale().await? {
                Some(row) => row,
                None => self.control.get().await?.ok_or(CronError::ControlMissing)?,
            };
        }

        if !control.is_stale(replica_id) {
            return Ok(());
        }

        self.reset_jobs(control).await
    }

    /// Rebuilds against `observed` and clears this replica's stale flag on
    /// that same row version. A newer row means a broadcast may have landed
    /// mid-rebuild, so the rebuild repeats while the replica is still stale.
    async fn reset_jobs(&self, mut observed: CronManagerControl) -> CronResult<()> {
        let retry = self.options.retry;
        for attempt in 0..=retry.max_retries {
            self.rebuild_schedule().await?;

            if self.control.clear_self_stale(&observed).await?.is_some() {
                return Ok(());
            }

            observed = self
                .control
                .get()
                .await?
                .ok_or(CronError::ControlMissing)?;
            if !observed.is_stale(self.replica_id()) {
                return Ok(());
            }

            if attempt < retry.max_retries {
                let backoff = retry.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    "Failed to reset jobs; Retrying in {} seconds...",
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
        }

        // Still stale; the next watch cycle tries again.
        tracing::warn!("Maximum retries reached. Failed to reset jobs.");
        Ok(())
    }

    /// Fired by a timer for any scheduled config.
    async fn on_tick(&self, config: CronConfig) {
        if config.name == WATCH_JOB {
            if let Err(e) = self.watch_cycle().await {
                tracing::warn!(error = %e, "Watch cycle failed");
            }
            return;
        }

        let payload = match config.job_type {
            JobType::Method => JobPayload::Method(config.name.clone()),
            JobType::Query => JobPayload::Query(config.query.clone().unwrap_or_default()),
            JobType::Inline => return,
        };
        self.handle_job(&config.name, payload).await;
    }

    fn tick_handler(&self) -> TickHandler {
        let this = self.this.clone();
        Arc::new(move |config| {
            let this = this.clone();
            Box::pin(async move {
                if let Some(manager) = this.upgrade() {
                    manager.on_tick(config).await;
                }
            })
        })
    }
}
