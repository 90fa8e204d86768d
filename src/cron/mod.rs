//! Distributed cron coordination.
//!
//! Every replica of an application process runs a [`CronManager`]. The
//! managers share a database holding the job configurations and a control
//! row, and a lock service that keeps a scheduled job from running on more
//! than one replica at a time (or hands out batch sequence numbers when a job
//! is meant to run on several).

pub mod control;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod interval;
pub mod lens;
pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod types;

pub use control::{ControlManager, RetryPolicy};
pub use crypto::QueryCipher;
pub use error::{CronError, CronResult};
pub use executor::{JobExecutor, JobRun, serialize_output};
pub use interval::interval_to_cron;
pub use lens::{Frame, Lens};
pub use manager::{CronManager, CronManagerOptions, InitStatus};
pub use registry::MethodRegistry;
pub use scheduler::{CronScheduler, is_schedulable, validate_cron_expression};
pub use types::{
    JobCallback, JobContext, JobOutput, JobPayload, JobStatus, WATCH_JOB, job_callback,
};
