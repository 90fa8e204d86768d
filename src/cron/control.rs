//! Global switch and replica membership, updated with optimistic retries.

use std::sync::Arc;
use std::time::Duration;

use crate::cron::{CronError, CronResult};
use crate::models::CronManagerControl;
use crate::repositories::DatabaseOps;

/// Bounded exponential backoff for conditional control-row writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Reads and writes the singleton control row on behalf of one replica.
pub struct ControlManager {
    store: Arc<dyn DatabaseOps>,
    replica_id: String,
    retry: RetryPolicy,
}

impl ControlManager {
    pub fn new(store: Arc<dyn DatabaseOps>, replica_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            store,
            replica_id: replica_id.into(),
            retry,
        }
    }

    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// `false` when the row is missing or cannot be read.
    pub async fn is_globally_enabled(&self) -> bool {
        match self.store.get_control().await {
            Ok(Some(control)) => control.enabled,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read control state");
                false
            }
        }
    }

    pub async fn get(&self) -> CronResult<Option<CronManagerControl>> {
        self.store.get_control().await
    }

    /// Creates the control row if none exists, otherwise registers this replica.
    pub async fn ensure_control(&self) -> CronResult<Option<CronManagerControl>> {
        match self.store.get_control().await? {
            None => {
                let control = self.store.create_control(&self.replica_id).await?;
                tracing::info!(replica_id = %self.replica_id, "Control state created");
                Ok(Some(control))
            }
            Some(_) => self.register_replica().await,
        }
    }

    pub async fn register_replica(&self) -> CronResult<Option<CronManagerControl>> {
        let id = self.replica_id.clone();
        self.update_with_retry("register replica", move |control| control.add_replica(&id))
            .await
    }

    /// Registers this replica and marks it stale in the same write.
    pub async fn register_stale(&self) -> CronResult<Option<CronManagerControl>> {
        let id = self.replica_id.clone();
        self.update_with_retry("register replica", move |control| {
            let added = control.add_replica(&id);
            let marked = control.add_stale(&id);
            added || marked
        })
        .await
    }

    /// Broadcasts a schedule change: every known replica becomes stale.
    pub async fn mark_all_stale(&self) -> CronResult<Option<CronManagerControl>> {
        self.update_with_retry("expire jobs", |control| {
            control.mark_all_stale();
            true
        })
        .await
    }

    /// Removes this replica from the stale set, conditional on the `cmcv` of
    /// `observed`, the row the caller rebuilt its schedule against.
    ///
    /// A single attempt. `None` means the row changed since `observed` was
    /// read, so the rebuild may have missed a broadcast.
    pub async fn clear_self_stale(
        &self,
        observed: &CronManagerControl,
    ) -> CronResult<Option<CronManagerControl>> {
        let mut control = observed.clone();
        if !control.clear_stale(&self.replica_id) {
            return Ok(Some(control));
        }
        self.store.update_control(&control).await
    }

    /// Forgets every replica.
    pub async fn purge(&self) -> CronResult<Option<CronManagerControl>> {
        self.update_with_retry("purge control", |control| {
            control.replica_ids.clear();
            control.stale_replicas.clear();
            true
        })
        .await
    }

    /// Flips the global switch and marks every replica stale so their
    /// schedules follow the new state.
    pub async fn toggle(&self) -> CronResult<Option<CronManagerControl>> {
        self.update_with_retry("toggle control", |control| {
            control.enabled = !control.enabled;
            control.mark_all_stale();
            true
        })
        .await
    }

    /// Applies `change` to a freshly read row and writes it conditionally on
    /// the `cmcv` that was read.
    ///
    /// `change` returns whether a write is needed. A conflict re-reads the row
    /// and re-applies `change` after the policy's backoff. Exhaustion is logged
    /// and reported as `Ok(None)`.
    pub async fn update_with_retry<F>(
        &self,
        operation: &str,
        change: F,
    ) -> CronResult<Option<CronManagerControl>>
    where
        F: Fn(&mut CronManagerControl) -> bool + Send + Sync,
    {
        for attempt in 0..=self.retry.max_retries {
            let mut control = self
                .store
                .get_control()
                .await?
                .ok_or(CronError::ControlMissing)?;

            if !change(&mut control) {
                return Ok(Some(control));
            }

            match self.store.update_control(&control).await {
                Ok(Some(updated)) => return Ok(Some(updated)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(operation, attempt, error = %e, "Control update failed");
                }
            }

            if attempt < self.retry.max_retries {
                let backoff = self.retry.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    "Failed to {}; Retrying in {} seconds...",
                    operation,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
        }

        tracing::warn!(operation, "Maximum retries reached. Failed to {}.", operation);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CronConfig, CronJob, NewCronConfig, NewCronJob};
    use crate::repositories::{CronConfigFilter, MemoryOperations};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    /// Rejects the first `conflicts` conditional writes as if another replica won.
    struct ConflictingOps {
        inner: MemoryOperations,
        conflicts: AtomicU32,
        writes: AtomicU32,
    }

    impl ConflictingOps {
        fn new(conflicts: u32) -> Self {
            Self {
                inner: MemoryOperations::new(),
                conflicts: AtomicU32::new(conflicts),
                writes: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DatabaseOps for ConflictingOps {
        async fn find_one_cron_config(
            &self,
            filter: &CronConfigFilter,
        ) -> CronResult<Option<CronConfig>> {
            self.inner.find_one_cron_config(filter).await
        }

        async fn find_cron_config(
            &self,
            filter: Option<&CronConfigFilter>,
        ) -> CronResult<Vec<CronConfig>> {
            self.inner.find_cron_config(filter).await
        }

        async fn create_cron_config(&self, data: NewCronConfig) -> CronResult<CronConfig> {
            self.inner.create_cron_config(data).await
        }

        async fn save_cron_config(&self, data: &CronConfig) -> CronResult<CronConfig> {
            self.inner.save_cron_config(data).await
        }

        async fn create_cron_job(&self, data: NewCronJob) -> CronResult<CronJob> {
            self.inner.create_cron_job(data).await
        }

        async fn save_cron_job(&self, data: &CronJob) -> CronResult<CronJob> {
            self.inner.save_cron_job(data).await
        }

        async fn query(&self, sql: &str) -> CronResult<serde_json::Value> {
            self.inner.query(sql).await
        }

        async fn create_control(&self, replica_id: &str) -> CronResult<CronManagerControl> {
            self.inner.create_control(replica_id).await
        }

        async fn get_control(&self) -> CronResult<Option<CronManagerControl>> {
            self.inner.get_control().await
        }

        async fn update_control(
            &self,
            data: &CronManagerControl,
        ) -> CronResult<Option<CronManagerControl>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Ok(None);
            }
            self.inner.update_control(data).await
        }

        fn backend_name(&self) -> &'static str {
            "conflicting"
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    proptest! {
        #[test]
        fn prop_delay_doubles(base_ms in 1u64..10_000, attempt in 0u32..16) {
            let policy = RetryPolicy { max_retries: 3, base_delay: Duration::from_millis(base_ms) };
            prop_assert_eq!(policy.delay_for(attempt + 1), policy.delay_for(attempt) * 2);
        }

        #[test]
        fn prop_delay_never_panics(attempt in any::<u32>()) {
            let policy = RetryPolicy::default();
            prop_assert!(policy.delay_for(attempt) >= policy.base_delay);
        }
    }

    #[tokio::test]
    async fn test_is_globally_enabled_without_row() {
        let store = Arc::new(MemoryOperations::new());
        let control = ControlManager::new(store, "a", fast_retry());
        assert!(!control.is_globally_enabled().await);
    }

    #[tokio::test]
    async fn test_ensure_control_is_idempotent() {
        let store = Arc::new(MemoryOperations::new());
        let control = ControlManager::new(store.clone(), "a", fast_retry());

        control.ensure_control().await.unwrap();
        control.ensure_control().await.unwrap();

        let row = store.get_control().await.unwrap().unwrap();
        assert!(row.enabled);
        assert_eq!(row.replica_ids, vec!["a".to_string()]);
        assert!(control.is_globally_enabled().await);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_on_fresh_row() {
        let store = Arc::new(ConflictingOps::new(2));
        store.inner.create_control("a").await.unwrap();
        let control = ControlManager::new(store.clone(), "b", fast_retry());

        let updated = control.register_replica().await.unwrap().unwrap();
        assert_eq!(updated.replica_ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_drop_the_change() {
        let store = Arc::new(ConflictingOps::new(u32::MAX));
        store.inner.create_control("a").await.unwrap();
        let control = ControlManager::new(store.clone(), "a", fast_retry());

        assert!(control.mark_all_stale().await.unwrap().is_none());
        assert_eq!(store.writes.load(Ordering::SeqCst), 4);
        let row = store.get_control().await.unwrap().unwrap();
        assert!(row.stale_replicas.is_empty());
    }

    #[tokio::test]
    async fn test_no_write_when_nothing_changes() {
        let store = Arc::new(ConflictingOps::new(0));
        store.inner.create_control("a").await.unwrap();
        let control = ControlManager::new(store.clone(), "a", fast_retry());

        let row = control.register_replica().await.unwrap().unwrap();
        control.clear_self_stale(&row).await.unwrap();
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_lifecycle() {
        let store = Arc::new(MemoryOperations::new());
        let a = ControlManager::new(store.clone(), "a", fast_retry());
        let b = ControlManager::new(store.clone(), "b", fast_retry());
        a.ensure_control().await.unwrap();
        b.ensure_control().await.unwrap();

        let row = a.mark_all_stale().await.unwrap().unwrap();
        assert_eq!(row.stale_replicas, row.replica_ids);

        let row = a.clear_self_stale(&row).await.unwrap().unwrap();
        let row = b.clear_self_stale(&row).await.unwrap().unwrap();
        assert!(row.stale_replicas.is_empty());
    }

    #[tokio::test]
    async fn test_clear_self_stale_rejects_outdated_row() {
        let store = Arc::new(MemoryOperations::new());
        let a = ControlManager::new(store.clone(), "a", fast_retry());
        let b = ControlManager::new(store.clone(), "b", fast_retry());
        a.ensure_control().await.unwrap();
        b.ensure_control().await.unwrap();

        let seen = a.mark_all_stale().await.unwrap().unwrap();
        b.mark_all_stale().await.unwrap();

        assert!(a.clear_self_stale(&seen).await.unwrap().is_none());
        let row = store.get_control().await.unwrap().unwrap();
        assert!(row.is_stale("a"));
    }

    #[tokio::test]
    async fn test_missing_row_is_an_error() {
        let store = Arc::new(MemoryOperations::new());
        let control = ControlManager::new(store, "a", fast_retry());
        assert!(matches!(
            control.mark_all_stale().await,
            Err(CronError::ControlMissing)
        ));
    }

    #[tokio::test]
    async fn test_toggle_flips_and_broadcasts() {
        let store = Arc::new(MemoryOperations::new());
        let control = ControlManager::new(store.clone(), "a", fast_retry());
        control.ensure_control().await.unwrap();

        let row = control.toggle().await.unwrap().unwrap();
        assert!(!row.enabled);
        assert_eq!(row.stale_replicas, vec!["a".to_string()]);
        assert!(!control.is_globally_enabled().await);
    }

    #[tokio::test]
    async fn test_purge_clears_membership() {
        let store = Arc::new(MemoryOperations::new());
        let control = ControlManager::new(store.clone(), "a", fast_retry());
        control.ensure_control().await.unwrap();
        control.mark_all_stale().await.unwrap();

        let row = control.purge().await.unwrap().unwrap();
        assert!(row.replica_ids.is_empty());
        assert!(row.stale_replicas.is_empty());
    }
}
