//! Repository for the `quality.reports` table. Reports are immutable once
//! created; there is no update path.

use parcelsync_core::types::DbId;
use sqlx::PgPool;

use crate::models::report::{NewReport, QualityReport};

/// Column list for `quality.reports` queries.
const COLUMNS: &str = "\
    id, name, tables_checked, overall_score, info_count, warning_count, \
    error_count, critical_count, report_data, created_at";

/// Default page size for report listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides insert and read operations for quality reports.
pub struct ReportRepo;

impl ReportRepo {
    /// Persist a finished report.
    pub async fn insert(pool: &PgPool, report: &NewReport) -> Result<QualityReport, sqlx::Error> {
        let query = format!(
            "INSERT INTO quality.reports \
                 (name, tables_checked, overall_score, info_count, warning_count, \
                  error_count, critical_count, report_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QualityReport>(&query)
            .bind(&report.name)
            .bind(&report.tables_checked)
            .bind(report.overall_score)
            .bind(report.counts.info as i64)
            .bind(report.counts.warning as i64)
            .bind(report.counts.error as i64)
            .bind(report.counts.critical as i64)
            .bind(&report.report_data)
            .fetch_one(pool)
            .await
    }

    /// Find one report by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<QualityReport>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quality.reports WHERE id = $1");
        sqlx::query_as::<_, QualityReport>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent reports.
    pub async fn list_recent(pool: &PgPool) -> Result<Vec<QualityReport>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM quality.reports ORDER BY created_at DESC LIMIT {DEFAULT_LIMIT}"
        );
        sqlx::query_as::<_, QualityReport>(&query).fetch_all(pool).await
    }
}
