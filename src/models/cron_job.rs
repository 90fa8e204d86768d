//! Execution history records.

use diesel::prelude::*;
use jiff::Timestamp;
use jiff_diesel::ToDiesel;
use serde::{Deserialize, Serialize};

/// One execution of a [`CronConfig`](super::CronConfig).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: i32,
    pub config_id: i32,
    pub result: Option<String>,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
}

impl CronJob {
    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some() || self.failed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCronJob {
    pub config_id: i32,
    pub started_at: Timestamp,
}

impl NewCronJob {
    pub fn starting_now(config_id: i32) -> Self {
        Self {
            config_id,
            started_at: Timestamp::now(),
        }
    }
}

/// CronJob query model for SELECT operations
#[derive(Debug, Queryable, Selectable, Identifiable, AsChangeset, Clone)]
#[diesel(table_name = crate::schema::cron_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct CronJobRow {
    pub id: i32,
    pub config_id: i32,
    pub result: Option<String>,
    pub started_at: jiff_diesel::Timestamp,
    pub completed_at: Option<jiff_diesel::Timestamp>,
    pub failed_at: Option<jiff_diesel::Timestamp>,
}

/// CronJob insert model
#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::cron_jobs)]
pub struct NewCronJobRow {
    pub config_id: i32,
    pub started_at: jiff_diesel::Timestamp,
}

impl From<CronJobRow> for CronJob {
    fn from(row: CronJobRow) -> Self {
        Self {
            id: row.id,
            config_id: row.config_id,
            result: row.result,
            started_at: row.started_at.to_jiff(),
            completed_at: row.completed_at.map(|ts| ts.to_jiff()),
            failed_at: row.failed_at.map(|ts| ts.to_jiff()),
        }
    }
}

impl From<&CronJob> for CronJobRow {
    fn from(job: &CronJob) -> Self {
        Self {
            id: job.id,
            config_id: job.config_id,
            result: job.result.clone(),
            started_at: job.started_at.to_diesel(),
            completed_at: job.completed_at.map(|ts| ts.to_diesel()),
            failed_at: job.failed_at.map(|ts| ts.to_diesel()),
        }
    }
}

impl From<NewCronJob> for NewCronJobRow {
    fn from(job: NewCronJob) -> Self {
        Self {
            config_id: job.config_id,
            started_at: job.started_at.to_diesel(),
        }
    }
}
