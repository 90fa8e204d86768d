use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::models::CronManagerControl;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub enabled: bool,
    pub replica_ids: Vec<String>,
    pub stale_replicas: Vec<String>,
    pub cmcv: String,
    pub updated_at: Timestamp,
}

impl From<CronManagerControl> for ControlResponse {
    fn from(control: CronManagerControl) -> Self {
        Self {
            enabled: control.enabled,
            replica_ids: control.replica_ids,
            stale_replicas: control.stale_replicas,
            cmcv: control.cmcv.to_string(),
            updated_at: control.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleControlResponse {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeControlResponse {
    /// `false` when concurrent writers won every retry
    pub purged: bool,
}
