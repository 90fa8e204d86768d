//! Cron job declarations.

use diesel::AsExpression;
use diesel::FromSqlRow;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use jiff::Timestamp;
use jiff_diesel::ToDiesel;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::io::Write;

// ============================================================================
// Enums
// ============================================================================

/// How the payload of a job is resolved at execution time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Invoked directly by application code, never placed on a timer
    Inline,
    /// Looked up by name in the method registry
    Method,
    /// Encrypted SQL text run through the database adapter
    Query,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Inline => "inline",
            JobType::Method => "method",
            JobType::Query => "query",
        }
    }

    /// Method and query jobs are driven by the scheduler.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, JobType::Method | JobType::Query)
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl diesel::query_builder::QueryId for JobType {
    type QueryId = JobType;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for JobType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for JobType {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        match s.as_str() {
            "inline" => Ok(JobType::Inline),
            "method" => Ok(JobType::Method),
            "query" => Ok(JobType::Query),
            _ => Err(format!("Unrecognized job_type: {}", s).into()),
        }
    }
}

// ============================================================================
// Domain models
// ============================================================================

/// A declared job, shared by every replica through the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronConfig {
    pub id: i32,
    pub name: String,
    pub job_type: JobType,
    pub enabled: bool,
    pub context: Option<JsonValue>,
    pub cron_expression: Option<String>,
    /// Ciphertext when `job_type` is `Query`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub silent: bool,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CronConfig {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Applies every field present in `changes`.
    pub fn apply(&mut self, changes: UpdateCronConfig) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(job_type) = changes.job_type {
            self.job_type = job_type;
        }
        if let Some(enabled) = changes.enabled {
            self.enabled = enabled;
        }
        if let Some(context) = changes.context {
            self.context = Some(context);
        }
        if let Some(expr) = changes.cron_expression {
            self.cron_expression = Some(expr);
        }
        if let Some(query) = changes.query {
            self.query = Some(query);
        }
        if let Some(silent) = changes.silent {
            self.silent = silent;
        }
    }
}

/// Input for creating a config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCronConfig {
    pub name: String,
    pub job_type: JobType,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub context: Option<JsonValue>,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub silent: bool,
}

/// Partial update for a config; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCronConfig {
    pub name: Option<String>,
    pub job_type: Option<JobType>,
    pub enabled: Option<bool>,
    pub context: Option<JsonValue>,
    pub cron_expression: Option<String>,
    pub query: Option<String>,
    pub silent: Option<bool>,
}

// ============================================================================
// Diesel rows
// ============================================================================

/// CronConfig query model for SELECT operations
#[derive(Debug, Queryable, Selectable, Identifiable, AsChangeset, Clone)]
#[diesel(table_name = crate::schema::cron_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct CronConfigRow {
    pub id: i32,
    pub name: String,
    pub job_type: JobType,
    pub enabled: bool,
    pub context: Option<JsonValue>,
    pub cron_expression: Option<String>,
    pub query: Option<String>,
    pub silent: bool,
    pub deleted_at: Option<jiff_diesel::Timestamp>,
    pub created_at: jiff_diesel::Timestamp,
    pub updated_at: jiff_diesel::Timestamp,
}

/// CronConfig insert model
#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::cron_configs)]
pub struct NewCronConfigRow {
    pub name: String,
    pub job_type: JobType,
    pub enabled: bool,
    pub context: Option<JsonValue>,
    pub cron_expression: Option<String>,
    pub query: Option<String>,
    pub silent: bool,
}

impl From<CronConfigRow> for CronConfig {
    fn from(row: CronConfigRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            job_type: row.job_type,
            enabled: row.enabled,
            context: row.context,
            cron_expression: row.cron_expression,
            query: row.query,
            silent: row.silent,
            deleted_at: row.deleted_at.map(|ts| ts.to_jiff()),
            created_at: row.created_at.to_jiff(),
            updated_at: row.updated_at.to_jiff(),
        }
    }
}

impl From<&CronConfig> for CronConfigRow {
    fn from(config: &CronConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            job_type: config.job_type,
            enabled: config.enabled,
            context: config.context.clone(),
            cron_expression: config.cron_expression.clone(),
            query: config.query.clone(),
            silent: config.silent,
            deleted_at: config.deleted_at.map(|ts| ts.to_diesel()),
            created_at: config.created_at.to_diesel(),
            updated_at: Timestamp::now().to_diesel(),
        }
    }
}

impl From<NewCronConfig> for NewCronConfigRow {
    fn from(config: NewCronConfig) -> Self {
        Self {
            name: config.name,
            job_type: config.job_type,
            enabled: config.enabled,
            context: config.context,
            cron_expression: config.cron_expression,
            query: config.query,
            silent: config.silent,
        }
    }
}
