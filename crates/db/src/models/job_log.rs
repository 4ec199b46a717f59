//! Append-only sync log entries, owned by their job.

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `sync.job_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobLog {
    pub id: DbId,
    pub job_id: DbId,
    pub level: String,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub message: String,
    pub created_at: Timestamp,
}

/// A log entry pending insertion (buffered writes batch these).
#[derive(Debug, Clone)]
pub struct NewJobLog {
    pub job_id: DbId,
    pub level: parcelsync_core::severity::LogLevel,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub message: String,
}

/// Query parameters for `GET /api/v1/jobs/{id}/logs`.
#[derive(Debug, Deserialize)]
pub struct JobLogQuery {
    /// Minimum level to return (`debug`, `info`, `warning`, `error`).
    pub level: Option<String>,
    /// Maximum number of results. Defaults to 200, capped at 1000.
    pub limit: Option<i64>,
}
