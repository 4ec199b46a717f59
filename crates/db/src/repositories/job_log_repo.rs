//! Repository for the append-only `sync.job_logs` table.

use parcelsync_core::types::DbId;
use sqlx::PgPool;

use crate::models::job_log::{JobLog, JobLogQuery, NewJobLog};

/// Column list for `sync.job_logs` queries.
const COLUMNS: &str = "id, job_id, level, table_name, record_id, message, created_at";

/// Default page size for log listing.
const DEFAULT_LIMIT: i64 = 200;

/// Maximum page size for log listing.
const MAX_LIMIT: i64 = 1000;

/// Provides append and query operations for sync logs.
pub struct JobLogRepo;

impl JobLogRepo {
    /// Append a single log entry.
    pub async fn append(pool: &PgPool, entry: &NewJobLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sync.job_logs (job_id, level, table_name, record_id, message) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.job_id)
        .bind(entry.level.as_str())
        .bind(&entry.table_name)
        .bind(&entry.record_id)
        .bind(&entry.message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Append a batch of buffered log entries in one round trip.
    pub async fn append_batch(pool: &PgPool, entries: &[NewJobLog]) -> Result<(), sqlx::Error> {
        if entries.is_empty() {
            return Ok(());
        }
        let job_ids: Vec<DbId> = entries.iter().map(|e| e.job_id).collect();
        let levels: Vec<&str> = entries.iter().map(|e| e.level.as_str()).collect();
        let tables: Vec<Option<&str>> =
            entries.iter().map(|e| e.table_name.as_deref()).collect();
        let records: Vec<Option<&str>> =
            entries.iter().map(|e| e.record_id.as_deref()).collect();
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();

        sqlx::query(
            "INSERT INTO sync.job_logs (job_id, level, table_name, record_id, message) \
             SELECT * FROM UNNEST($1::bigint[], $2::text[], $3::text[], $4::text[], $5::text[])",
        )
        .bind(&job_ids)
        .bind(&levels)
        .bind(&tables)
        .bind(&records)
        .bind(&messages)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List a job's log entries in insertion order, filtered to entries at
    /// or above the requested level.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
        params: &JobLogQuery,
    ) -> Result<Vec<JobLog>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let levels = admitted_levels(params.level.as_deref());

        let query = format!(
            "SELECT {COLUMNS} FROM sync.job_logs \
             WHERE job_id = $1 AND level = ANY($2) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, JobLog>(&query)
            .bind(job_id)
            .bind(&levels)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

/// Levels at or above the given minimum; everything for `None` or an
/// unknown level string.
fn admitted_levels(min_level: Option<&str>) -> Vec<String> {
    let all = ["debug", "info", "warning", "error"];
    let start = min_level
        .and_then(|l| all.iter().position(|candidate| *candidate == l))
        .unwrap_or(0);
    all[start..].iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admitted_levels_filters_upward() {
        assert_eq!(admitted_levels(Some("warning")), vec!["warning", "error"]);
        assert_eq!(admitted_levels(None).len(), 4);
        assert_eq!(admitted_levels(Some("verbose")).len(), 4);
    }
}
