use serde::Serialize;

use crate::cron::InitStatus;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub version: String,
    pub replica_id: String,
    pub globally_enabled: bool,
    pub scheduled_jobs: Vec<String>,
    pub checks: Vec<InitStatus>,
}
