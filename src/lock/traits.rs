//! LockService trait definition.

use async_trait::async_trait;

use crate::lock::LockError;

/// Shared key-value service used for cross-replica mutual exclusion.
///
/// Every replica must point at the same backend; keys are absolute and the
/// caller is responsible for prefixing them (see [`LockKeys`](crate::lock::LockKeys)).
#[async_trait]
pub trait LockService: Send + Sync {
    /// Store `value` under `key` only if the key does not exist yet.
    /// Returns `true` when this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, LockError>;

    /// Atomically increment the integer stored under `key`, starting from zero.
    async fn increment(&self, key: &str) -> Result<i64, LockError>;

    /// Delete `key` only if it still holds `expected`. Returns `true` on delete.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError>;

    /// Delete every key starting with `prefix`. Returns the number of deleted keys.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, LockError>;

    async fn get(&self, key: &str) -> Result<Option<String>, LockError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), LockError>;

    async fn delete(&self, key: &str) -> Result<(), LockError>;
}
