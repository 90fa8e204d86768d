//! The singleton coordination row shared by all replicas.

use diesel::prelude::*;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global switch, replica membership and the optimistic version token.
///
/// `cmcv` changes on every successful write and is only used to detect a
/// concurrent write between a read and the following conditional update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronManagerControl {
    pub id: i32,
    pub enabled: bool,
    pub replica_ids: Vec<String>,
    pub stale_replicas: Vec<String>,
    pub cmcv: Uuid,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CronManagerControl {
    pub fn has_replica(&self, replica_id: &str) -> bool {
        self.replica_ids.iter().any(|id| id == replica_id)
    }

    pub fn is_stale(&self, replica_id: &str) -> bool {
        self.stale_replicas.iter().any(|id| id == replica_id)
    }

    /// Returns `true` when the id was not yet a member.
    pub fn add_replica(&mut self, replica_id: &str) -> bool {
        if self.has_replica(replica_id) {
            return false;
        }
        self.replica_ids.push(replica_id.to_string());
        true
    }

    /// Returns `true` when the id was not yet stale.
    pub fn add_stale(&mut self, replica_id: &str) -> bool {
        if self.is_stale(replica_id) {
            return false;
        }
        self.stale_replicas.push(replica_id.to_string());
        true
    }

    /// Every known replica becomes stale.
    pub fn mark_all_stale(&mut self) {
        self.stale_replicas = self.replica_ids.clone();
    }

    /// Returns `true` when the id was stale.
    pub fn clear_stale(&mut self, replica_id: &str) -> bool {
        let before = self.stale_replicas.len();
        self.stale_replicas.retain(|id| id != replica_id);
        before != self.stale_replicas.len()
    }
}

/// Control query model for SELECT operations
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::cron_manager_control)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CronManagerControlRow {
    pub id: i32,
    pub enabled: bool,
    pub replica_ids: Vec<String>,
    pub stale_replicas: Vec<String>,
    pub cmcv: Uuid,
    pub created_at: jiff_diesel::Timestamp,
    pub updated_at: jiff_diesel::Timestamp,
}

/// Control insert model
#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::cron_manager_control)]
pub struct NewCronManagerControlRow {
    pub enabled: bool,
    pub replica_ids: Vec<String>,
    pub stale_replicas: Vec<String>,
    pub cmcv: Uuid,
}

impl NewCronManagerControlRow {
    /// Seed written by the first replica that finds no control row.
    pub fn seed(replica_id: &str) -> Self {
        Self {
            enabled: true,
            replica_ids: vec![replica_id.to_string()],
            stale_replicas: Vec::new(),
            cmcv: Uuid::new_v4(),
        }
    }
}

impl From<CronManagerControlRow> for CronManagerControl {
    fn from(row: CronManagerControlRow) -> Self {
        Self {
            id: row.id,
            enabled: row.enabled,
            replica_ids: row.replica_ids,
            stale_replicas: row.stale_replicas,
            cmcv: row.cmcv,
            created_at: row.created_at.to_jiff(),
            updated_at: row.updated_at.to_jiff(),
        }
    }
}
