//! Sync job entity models and DTOs.

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `sync.jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncJob {
    pub id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    pub initiated_by: String,
    pub idempotency_key: Option<String>,
    pub parameters: serde_json::Value,
    /// Cooperative control flags, observed by the engine between batches.
    pub cancel_requested: bool,
    pub pause_requested: bool,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    /// Per-table watermarks, keyed by table name. The job row is the only
    /// cursor store.
    pub watermarks: serde_json::Value,
    pub tables_processed: i32,
    pub rows_read: i64,
    pub rows_written: i64,
    pub rows_skipped: i64,
    pub issues: i64,
    pub sanitized_fields: i64,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting a new job via `POST /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJob {
    pub job_type: String,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    /// Supplying a key makes submission idempotent per (job_type, key).
    pub idempotency_key: Option<String>,
}

/// Per-table counter deltas accumulated onto the job row.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobTotals {
    pub tables_processed: i32,
    pub rows_read: i64,
    pub rows_written: i64,
    pub rows_skipped: i64,
    pub issues: i64,
    pub sanitized_fields: i64,
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Filter by status ID (e.g. 1 = pending, 4 = failed).
    pub status_id: Option<StatusId>,
    /// Filter by job type (e.g. `incremental_sync`).
    pub job_type: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
