//! Distributed lock service used by the execution engine.
//!
//! Two backends share one trait:
//! - [`RedisLockService`]: Redis through a bb8 pool, for real deployments
//! - [`MemoryLockService`]: process-local map, for single-process runs and tests

mod error;
mod memory;
mod redis;
mod traits;

pub use error::LockError;
pub use memory::MemoryLockService;
pub use redis::RedisLockService;
pub use traits::LockService;

/// Key layout for one lock prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockKeys {
    prefix: String,
}

impl LockKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Exclusive lock for a job.
    pub fn lock(&self, job: &str) -> String {
        format!("{}:lock:{}", self.prefix, job)
    }

    /// Batch sequence counter for a job running in batched mode.
    pub fn batch(&self, job: &str) -> String {
        format!("{}:batch:{}", self.prefix, job)
    }

    /// Dynamic context stored by the control API.
    pub fn context(&self, job: &str) -> String {
        format!("{}:context:{}", self.prefix, job)
    }

    /// Prefix covering every exclusive lock key.
    pub fn all_locks(&self) -> String {
        format!("{}:lock:", self.prefix)
    }
}
