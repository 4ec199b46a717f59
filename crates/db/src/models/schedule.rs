//! Sync schedule rows. Exactly one of `cron_expression` / `interval_hours`
//! is non-null per row (database CHECK plus activation-time validation).

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `sync.schedules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncSchedule {
    pub id: DbId,
    pub name: String,
    pub job_type: String,
    /// `cron` or `interval`.
    pub schedule_type: String,
    pub cron_expression: Option<String>,
    pub interval_hours: Option<i32>,
    pub parameters: serde_json::Value,
    pub is_active: bool,
    pub last_run: Option<Timestamp>,
    /// Null while paused; recomputed on resume.
    pub next_run: Option<Timestamp>,
    pub last_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a schedule.
#[derive(Debug, Deserialize)]
pub struct NewSchedule {
    pub name: String,
    pub job_type: String,
    pub cron_expression: Option<String>,
    pub interval_hours: Option<i32>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// DTO for updating a schedule.
#[derive(Debug, Deserialize)]
pub struct UpdateSchedule {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub interval_hours: Option<i32>,
    pub parameters: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}
