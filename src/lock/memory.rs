//! Process-local lock service backed by a concurrent map.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;

use crate::lock::{LockError, LockService};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory lock service.
///
/// Only coordinates tasks inside one process. Share one instance between
/// several managers to simulate replicas.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    entries: DashMap<String, Entry>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        None
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, LockError> {
        let now = Instant::now();
        let fresh = Entry {
            value: value.to_string(),
            // Past the clock's range the entry never expires.
            expires_at: now.checked_add(Duration::from_millis(ttl_ms)),
        };

        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn increment(&self, key: &str) -> Result<i64, LockError> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| LockError::NotAnInteger(key.to_string()))?;
        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove_if(key, |_, entry| entry.is_live(now) && entry.value == expected)
            .is_some())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, LockError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LockError> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LockError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), LockError> {
        self.entries.remove(key);
        Ok(())
    }
}
