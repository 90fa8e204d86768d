mod control;
mod cron_config;
mod cron_job;

pub use control::{CronManagerControl, CronManagerControlRow, NewCronManagerControlRow};
pub use cron_config::{
    CronConfig, CronConfigRow, JobType, NewCronConfig, NewCronConfigRow, UpdateCronConfig,
};
pub use cron_job::{CronJob, CronJobRow, NewCronJob, NewCronJobRow};
