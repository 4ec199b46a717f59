//! Quality report rows. Immutable once created.

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `quality.reports` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QualityReport {
    pub id: DbId,
    pub name: String,
    pub tables_checked: Vec<String>,
    /// Null when the report's source set was empty.
    pub overall_score: Option<f64>,
    pub info_count: i64,
    pub warning_count: i64,
    pub error_count: i64,
    pub critical_count: i64,
    /// Per-table breakdown (scores, sub-scores, rows checked).
    pub report_data: serde_json::Value,
    pub created_at: Timestamp,
}

/// A report pending insertion.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub name: String,
    pub tables_checked: Vec<String>,
    pub overall_score: Option<f64>,
    pub counts: parcelsync_core::quality::SeverityCounts,
    pub report_data: serde_json::Value,
}

/// DTO for `POST /api/v1/quality/reports`.
#[derive(Debug, Deserialize)]
pub struct TriggerReport {
    pub name: Option<String>,
    /// Restrict to these tables; absent means every configured table.
    pub tables: Option<Vec<String>>,
}
