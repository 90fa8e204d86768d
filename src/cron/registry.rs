use std::collections::HashMap;
use std::future::Future;

use crate::cron::{JobCallback, JobContext, JobOutput, Lens, job_callback};

/// Maps method-job names to their callbacks.
///
/// The name must match the `name` of the `CronConfig` that schedules it.
#[derive(Default, Clone)]
pub struct MethodRegistry {
    methods: HashMap<String, JobCallback>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async method under `name`, replacing any previous one.
    pub fn register<F, Fut, O>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(JobContext, Lens) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
        O: Into<JobOutput>,
    {
        self.methods.insert(name.into(), job_callback(f));
        self
    }

    pub fn register_callback(&mut self, name: impl Into<String>, callback: JobCallback) -> &mut Self {
        self.methods.insert(name.into(), callback);
        self
    }

    pub fn get(&self, name: &str) -> Option<JobCallback> {
        self.methods.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("MethodRegistry").field("methods", &names).finish()
    }
}
