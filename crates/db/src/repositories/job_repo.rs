//! Repository for the `sync.jobs` table.
//!
//! Uses `JobStatus` from `models::status` for all status transitions.
//! Terminal statuses are write-once: complete/fail/cancel are guarded so a
//! second termination attempt is a no-op.

use parcelsync_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{JobListQuery, JobTotals, SubmitJob, SyncJob};
use crate::models::status::{JobStatus, StatusId};

/// Column list for `sync.jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, initiated_by, idempotency_key, parameters, \
    cancel_requested, pause_requested, error_kind, error_message, watermarks, \
    tables_processed, rows_read, rows_written, rows_skipped, issues, sanitized_fields, \
    submitted_at, started_at, ended_at, created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Terminal statuses: succeeded, failed, cancelled.
const TERMINAL_STATUSES: [StatusId; 3] = [
    JobStatus::Succeeded as StatusId,
    JobStatus::Failed as StatusId,
    JobStatus::Cancelled as StatusId,
];

/// Provides CRUD operations for sync jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job. Returns immediately with the job row.
    ///
    /// When `idempotency_key` is supplied, submission is idempotent per
    /// (job_type, key): an existing non-terminal job with the same pair is
    /// returned instead of creating a duplicate.
    pub async fn submit(
        pool: &PgPool,
        initiated_by: &str,
        input: &SubmitJob,
    ) -> Result<SyncJob, sqlx::Error> {
        if let Some(key) = &input.idempotency_key {
            let existing = Self::find_by_idempotency_key(pool, &input.job_type, key).await?;
            if let Some(job) = existing {
                return Ok(job);
            }
        }

        let query = format!(
            "INSERT INTO sync.jobs (job_type, status_id, initiated_by, idempotency_key, parameters) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(&input.job_type)
            .bind(JobStatus::Pending.id())
            .bind(initiated_by)
            .bind(&input.idempotency_key)
            .bind(input.parameters.clone().unwrap_or_else(|| serde_json::json!({})))
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next pending job for execution.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` to prevent double-dispatch when
    /// multiple worker processes are running. The claim transitions the job
    /// to Running and stamps `started_at`.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<SyncJob>, sqlx::Error> {
        let query = format!(
            "UPDATE sync.jobs \
             SET status_id = $1, started_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM sync.jobs \
                 WHERE status_id = $2 \
                 ORDER BY submitted_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SyncJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sync.jobs WHERE id = $1");
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a non-terminal job by (job_type, idempotency_key).
    pub async fn find_by_idempotency_key(
        pool: &PgPool,
        job_type: &str,
        key: &str,
    ) -> Result<Option<SyncJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync.jobs \
             WHERE job_type = $1 AND idempotency_key = $2 AND status_id NOT IN ($3, $4, $5) \
             ORDER BY submitted_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(job_type)
            .bind(key)
            .bind(TERMINAL_STATUSES[0])
            .bind(TERMINAL_STATUSES[1])
            .bind(TERMINAL_STATUSES[2])
            .fetch_optional(pool)
            .await
    }

    /// Whether another job of the same type is currently pending or running.
    pub async fn has_active_of_type(pool: &PgPool, job_type: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync.jobs \
             WHERE job_type = $1 AND status_id IN ($2, $3, $4)",
        )
        .bind(job_type)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .bind(JobStatus::Paused.id())
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// Mark a job as succeeded. No-op if the job is already terminal.
    pub async fn complete(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        Self::terminate(pool, job_id, JobStatus::Succeeded, None, None).await
    }

    /// Mark a job as failed with an error kind and message.
    /// No-op if the job is already terminal.
    pub async fn fail(
        pool: &PgPool,
        job_id: DbId,
        error_kind: &str,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        Self::terminate(
            pool,
            job_id,
            JobStatus::Failed,
            Some(error_kind),
            Some(error_message),
        )
        .await
    }

    /// Request cooperative cancellation.
    ///
    /// A pending job is cancelled outright; a running or paused job gets
    /// its `cancel_requested` flag set and the engine finalizes between
    /// batches. Returns `false` if the job was already terminal.
    pub async fn request_cancel(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        // Pending jobs have no engine observing flags; cancel directly.
        let direct = sqlx::query(
            "UPDATE sync.jobs \
             SET status_id = $2, error_kind = 'cancelled_by_user', \
                 ended_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(JobStatus::Cancelled.id())
        .bind(JobStatus::Pending.id())
        .execute(pool)
        .await?;
        if direct.rows_affected() > 0 {
            return Ok(true);
        }

        let flagged = sqlx::query(
            "UPDATE sync.jobs \
             SET cancel_requested = TRUE, updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($2, $3, $4)",
        )
        .bind(job_id)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(flagged.rows_affected() > 0)
    }

    /// Request a pause. Observed by the engine between tables, never
    /// mid-batch. Returns `false` unless the job is running.
    pub async fn request_pause(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync.jobs SET pause_requested = TRUE, updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(job_id)
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resume a paused (or pause-requested) job.
    pub async fn resume(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync.jobs \
             SET pause_requested = FALSE, \
                 status_id = CASE WHEN status_id = $2 THEN $3 ELSE status_id END, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($2, $3)",
        )
        .bind(job_id)
        .bind(JobStatus::Paused.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record that the engine honored a pause request.
    pub async fn mark_paused(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync.jobs SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(JobStatus::Paused.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record that a cancel request was honored.
    /// No-op if the job is already terminal.
    pub async fn mark_cancelled(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        Self::terminate(
            pool,
            job_id,
            JobStatus::Cancelled,
            Some("cancelled_by_user"),
            None,
        )
        .await
    }

    /// Accumulate per-table totals onto the job row.
    pub async fn add_totals(
        pool: &PgPool,
        job_id: DbId,
        totals: &JobTotals,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync.jobs SET \
                 tables_processed = tables_processed + $2, \
                 rows_read = rows_read + $3, \
                 rows_written = rows_written + $4, \
                 rows_skipped = rows_skipped + $5, \
                 issues = issues + $6, \
                 sanitized_fields = sanitized_fields + $7, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(totals.tables_processed)
        .bind(totals.rows_read)
        .bind(totals.rows_written)
        .bind(totals.rows_skipped)
        .bind(totals.issues)
        .bind(totals.sanitized_fields)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Advance the watermark for one table on the job row.
    pub async fn set_watermark(
        pool: &PgPool,
        job_id: DbId,
        table_name: &str,
        watermark: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync.jobs \
             SET watermarks = jsonb_set(watermarks, ARRAY[$2], $3, true), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(table_name)
        .bind(watermark)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Latest watermark recorded for a table across completed jobs of the
    /// given types. This is the incremental pull's lower bound.
    pub async fn last_watermark(
        pool: &PgPool,
        table_name: &str,
        job_types: &[String],
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<serde_json::Value>>(
            "SELECT watermarks -> $1 FROM sync.jobs \
             WHERE job_type = ANY($2) AND watermarks ? $1 \
             ORDER BY submitted_at DESC LIMIT 1",
        )
        .bind(table_name)
        .bind(job_types)
        .fetch_optional(pool)
        .await
        .map(Option::flatten)
    }

    /// List jobs with optional status/type filters and pagination.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<SyncJob>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.job_type.is_some() {
            conditions.push(format!("job_type = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM sync.jobs \
             {where_clause} \
             ORDER BY submitted_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, SyncJob>(&query);
        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        if let Some(jt) = &params.job_type {
            q = q.bind(jt);
        }
        q = q.bind(limit).bind(offset);

        q.fetch_all(pool).await
    }

    /// Shared terminal-state writer, guarded against double termination.
    async fn terminate(
        pool: &PgPool,
        job_id: DbId,
        status: JobStatus,
        error_kind: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync.jobs \
             SET status_id = $2, error_kind = COALESCE($3, error_kind), \
                 error_message = COALESCE($4, error_message), \
                 ended_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($5, $6, $7)",
        )
        .bind(job_id)
        .bind(status.id())
        .bind(error_kind)
        .bind(error_message)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(())
    }
}
