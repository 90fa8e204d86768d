use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::cron::{CronResult, Lens};

/// Reserved name of the internal watch job.
pub const WATCH_JOB: &str = "cmc";

const DEFAULT_LOCK_TTL_SECS: u64 = 30;

/// Upper bound for a lock `ttl` (30 days).
const MAX_LOCK_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_LOCK_RETRIES: u32 = 3;
const DEFAULT_LOCK_RETRY_DELAY_SECS: u64 = 3;

/// Execution parameters parsed from `CronConfig.context` for one invocation.
///
/// Unknown keys are kept in `extra` so payloads can read their own settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobContext {
    /// Requires the lock service before running
    pub distributed: bool,
    /// Lock TTL in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Seconds between lock attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<u64>,
    /// Batched mode instead of exclusive locking
    pub concurrent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,
    /// Sequence number assigned in batched mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<i64>,
    pub run_once: bool,
    pub dry_run: bool,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl JobContext {
    /// A missing or `null` context yields the defaults.
    pub fn from_value(value: Option<&JsonValue>) -> CronResult<Self> {
        match value {
            None | Some(JsonValue::Null) => Ok(Self::default()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }

    /// Lock expiry in milliseconds, capped at 30 days.
    pub fn lock_ttl_ms(&self) -> u64 {
        self.ttl
            .filter(|&t| t > 0)
            .unwrap_or(DEFAULT_LOCK_TTL_SECS)
            .min(MAX_LOCK_TTL_SECS)
            .saturating_mul(1000)
    }

    pub fn lock_attempts(&self) -> u32 {
        self.max_retries
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_LOCK_RETRIES)
    }

    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_secs(
            self.retry_delay
                .filter(|&d| d > 0)
                .unwrap_or(DEFAULT_LOCK_RETRY_DELAY_SECS),
        )
    }

    /// Number of batch members allowed in batched mode.
    pub fn batch_size(&self) -> i64 {
        self.replicas.filter(|&n| n > 0).unwrap_or(1)
    }
}

/// Outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Success,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "Success"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// What a payload hands back to the engine.
#[derive(Debug, Clone, Default)]
pub enum JobOutput {
    #[default]
    Empty,
    Text(String),
    Json(JsonValue),
    Trace(Lens),
}

impl From<()> for JobOutput {
    fn from(_: ()) -> Self {
        JobOutput::Empty
    }
}

impl From<String> for JobOutput {
    fn from(text: String) -> Self {
        JobOutput::Text(text)
    }
}

impl From<&str> for JobOutput {
    fn from(text: &str) -> Self {
        JobOutput::Text(text.to_string())
    }
}

impl From<JsonValue> for JobOutput {
    fn from(value: JsonValue) -> Self {
        JobOutput::Json(value)
    }
}

impl From<Lens> for JobOutput {
    fn from(lens: Lens) -> Self {
        JobOutput::Trace(lens)
    }
}

/// Uniform signature every payload is resolved to before execution.
pub type JobCallback =
    Arc<dyn Fn(JobContext, Lens) -> BoxFuture<'static, anyhow::Result<JobOutput>> + Send + Sync>;

/// Wraps an async closure as a [`JobCallback`].
pub fn job_callback<F, Fut, O>(f: F) -> JobCallback
where
    F: Fn(JobContext, Lens) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    O: Into<JobOutput>,
{
    Arc::new(move |ctx, lens| {
        let fut = f(ctx, lens);
        Box::pin(async move { fut.await.map(Into::into) })
    })
}

/// The three payload shapes a job can have.
#[derive(Clone)]
pub enum JobPayload {
    /// Callback supplied by the caller of `handle_job`
    Inline(JobCallback),
    /// Name looked up in the method registry
    Method(String),
    /// Encrypted SQL text
    Query(String),
}

impl std::fmt::Debug for JobPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPayload::Inline(_) => f.write_str("Inline(<callback>)"),
            JobPayload::Method(name) => f.debug_tuple("Method").field(name).finish(),
            JobPayload::Query(_) => f.write_str("Query(<encrypted>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_defaults() {
        let ctx = JobContext::from_value(None).unwrap();
        assert!(!ctx.distributed);
        assert_eq!(ctx.lock_ttl_ms(), 30_000);
        assert_eq!(ctx.lock_attempts(), 3);
        assert_eq!(ctx.lock_retry_delay(), Duration::from_secs(3));
        assert_eq!(ctx.batch_size(), 1);
        assert_eq!(JobContext::from_value(Some(&JsonValue::Null)).unwrap(), ctx);
    }

    #[test]
    fn test_context_parses_camel_case_and_extras() {
        let value = json!({
            "distributed": true,
            "ttl": 10,
            "maxRetries": 5,
            "retryDelay": 1,
            "concurrent": true,
            "replicas": 2,
            "runOnce": true,
            "table": "posts"
        });
        let ctx = JobContext::from_value(Some(&value)).unwrap();
        assert!(ctx.distributed && ctx.concurrent && ctx.run_once);
        assert_eq!(ctx.lock_ttl_ms(), 10_000);
        assert_eq!(ctx.lock_attempts(), 5);
        assert_eq!(ctx.lock_retry_delay(), Duration::from_secs(1));
        assert_eq!(ctx.batch_size(), 2);
        assert_eq!(ctx.extra.get("table"), Some(&json!("posts")));

        let back = serde_json::to_value(&ctx).unwrap();
        assert_eq!(back["table"], json!("posts"));
        assert_eq!(back["maxRetries"], json!(5));
    }

    #[test]
    fn test_zero_values_use_defaults() {
        let ctx = JobContext::from_value(Some(&json!({"ttl": 0, "maxRetries": 0}))).unwrap();
        assert_eq!(ctx.lock_ttl_ms(), 30_000);
        assert_eq!(ctx.lock_attempts(), 3);
    }

    #[test]
    fn test_oversized_ttl_is_capped() {
        let ctx = JobContext::from_value(Some(&json!({"distributed": true, "ttl": 1844674407370955161u64})))
            .unwrap();
        assert_eq!(ctx.lock_ttl_ms(), MAX_LOCK_TTL_SECS * 1000);

        let ctx = JobContext::from_value(Some(&json!({"ttl": u64::MAX}))).unwrap();
        assert_eq!(ctx.lock_ttl_ms(), MAX_LOCK_TTL_SECS * 1000);
    }

    #[test]
    fn test_invalid_context_is_an_error() {
        assert!(JobContext::from_value(Some(&json!({"distributed": "yes"}))).is_err());
    }

    #[tokio::test]
    async fn test_job_callback_converts_output() {
        let cb = job_callback(|_ctx, _lens| async { Ok::<_, anyhow::Error>("done") });
        let out = cb(JobContext::default(), Lens::new()).await.unwrap();
        assert!(matches!(out, JobOutput::Text(ref t) if t == "done"));
    }
}
