//! Repository for the `sync.sanitization_audit` table.

use parcelsync_core::sanitize::AuditEntry;
use parcelsync_core::types::DbId;
use sqlx::PgPool;

/// Provides insert operations for sanitization audit entries.
pub struct AuditRepo;

impl AuditRepo {
    /// Record the audit trail for one sanitized row.
    pub async fn insert_entries(
        pool: &PgPool,
        job_id: DbId,
        table_name: &str,
        record_id: &str,
        entries: &[AuditEntry],
    ) -> Result<(), sqlx::Error> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO sync.sanitization_audit \
                     (job_id, table_name, record_id, field_name, strategy, outcome, token, error) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(job_id)
            .bind(table_name)
            .bind(record_id)
            .bind(&entry.field)
            .bind(entry.strategy.as_str())
            .bind(entry.outcome.as_str())
            .bind(&entry.token)
            .bind(&entry.error)
            .execute(pool)
            .await?;
        }
        Ok(())
    }

    /// Count audit entries for one job (totals reconciliation).
    pub async fn count_for_job(pool: &PgPool, job_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sync.sanitization_audit WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(pool)
            .await
    }
}
