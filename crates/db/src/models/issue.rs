//! Data-quality issue rows.
//!
//! Lifecycle: `open -> acknowledged? -> resolved | suppressed`. Only open
//! issues count toward scores; suppression silences future identical
//! issues (same rule, record, field).

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `quality.issues` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QualityIssue {
    pub id: DbId,
    /// Nullable: issues detected by the sync engine directly (e.g.
    /// constraint violations) carry no rule.
    pub rule_id: Option<DbId>,
    /// The job that detected the issue; null for scheduled scans.
    pub job_id: Option<DbId>,
    pub table_name: String,
    pub field_name: Option<String>,
    pub record_id: String,
    pub issue_type: String,
    pub issue_value: Option<serde_json::Value>,
    pub severity: String,
    pub status: String,
    pub detected_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub resolved_by: Option<String>,
}

/// An issue pending insertion.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub rule_id: Option<DbId>,
    pub job_id: Option<DbId>,
    pub table_name: String,
    pub field_name: Option<String>,
    pub record_id: String,
    pub issue_type: String,
    pub issue_value: Option<serde_json::Value>,
    pub severity: parcelsync_core::severity::Severity,
}

/// Query parameters for `GET /api/v1/quality/issues`.
#[derive(Debug, Deserialize)]
pub struct IssueListQuery {
    pub table_name: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub job_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// DTO for `PUT /api/v1/quality/issues/{id}` status updates.
#[derive(Debug, Deserialize)]
pub struct UpdateIssueStatus {
    pub status: String,
    pub resolved_by: Option<String>,
}
