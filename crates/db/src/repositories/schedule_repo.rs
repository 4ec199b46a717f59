//! Repository for the `sync.schedules` table.
//!
//! The scheduler holds no durable state of its own: this table is the
//! store of record, and the tick loop only reads/writes through here.

use chrono::{DateTime, Utc};
use parcelsync_core::cron::validate_schedule;
use parcelsync_core::types::DbId;
use parcelsync_core::CoreError;
use sqlx::PgPool;

use crate::models::schedule::{NewSchedule, SyncSchedule, UpdateSchedule};

/// Column list for `sync.schedules` queries.
const COLUMNS: &str = "\
    id, name, job_type, schedule_type, cron_expression, interval_hours, parameters, \
    is_active, last_run, next_run, last_job_id, created_at, updated_at";

/// Provides CRUD and tick-loop operations for schedules.
pub struct ScheduleRepo;

impl ScheduleRepo {
    /// Validate a schedule definition before it reaches the database.
    pub fn validate(input: &NewSchedule) -> Result<(), CoreError> {
        validate_schedule(
            input.cron_expression.as_deref(),
            input.interval_hours.map(i64::from),
        )
    }

    /// Create a schedule with its first `next_run` already computed.
    pub async fn create(
        pool: &PgPool,
        input: &NewSchedule,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<SyncSchedule, sqlx::Error> {
        let schedule_type = if input.cron_expression.is_some() {
            "cron"
        } else {
            "interval"
        };
        let query = format!(
            "INSERT INTO sync.schedules \
                 (name, job_type, schedule_type, cron_expression, interval_hours, \
                  parameters, is_active, next_run) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncSchedule>(&query)
            .bind(&input.name)
            .bind(&input.job_type)
            .bind(schedule_type)
            .bind(&input.cron_expression)
            .bind(input.interval_hours)
            .bind(input.parameters.clone().unwrap_or_else(|| serde_json::json!({})))
            .bind(input.is_active)
            .bind(next_run)
            .fetch_one(pool)
            .await
    }

    /// Find one schedule by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SyncSchedule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sync.schedules WHERE id = $1");
        sqlx::query_as::<_, SyncSchedule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All schedules.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<SyncSchedule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sync.schedules ORDER BY id");
        sqlx::query_as::<_, SyncSchedule>(&query).fetch_all(pool).await
    }

    /// Active schedules whose `next_run` has arrived.
    pub async fn list_due(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncSchedule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync.schedules \
             WHERE is_active AND next_run IS NOT NULL AND next_run <= $1 \
             ORDER BY next_run ASC"
        );
        sqlx::query_as::<_, SyncSchedule>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Record a firing: last run, spawned job, and the recomputed next run.
    pub async fn record_run(
        pool: &PgPool,
        id: DbId,
        last_run: DateTime<Utc>,
        last_job_id: DbId,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync.schedules \
             SET last_run = $2, last_job_id = $3, next_run = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(last_run)
        .bind(last_job_id)
        .bind(next_run)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Defer an overrunning schedule without firing it.
    pub async fn defer(
        pool: &PgPool,
        id: DbId,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sync.schedules SET next_run = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next_run)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Pause: clear `next_run` so ticks skip the schedule.
    pub async fn pause(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync.schedules SET next_run = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resume with a freshly computed `next_run`.
    pub async fn resume(
        pool: &PgPool,
        id: DbId,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync.schedules SET next_run = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(next_run)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update a schedule. The caller passes the FINAL recurrence pair
    /// (already validated as exactly-one-set) so a cron schedule can be
    /// switched to interval and back without tripping the CHECK.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSchedule,
        cron_expression: Option<&str>,
        interval_hours: Option<i32>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<Option<SyncSchedule>, sqlx::Error> {
        let query = format!(
            "UPDATE sync.schedules \
             SET name = COALESCE($2, name), \
                 schedule_type = CASE WHEN $3::text IS NOT NULL THEN 'cron' ELSE 'interval' END, \
                 cron_expression = $3, \
                 interval_hours = $4, \
                 parameters = COALESCE($5, parameters), \
                 is_active = COALESCE($6, is_active), \
                 next_run = $7, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncSchedule>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(cron_expression)
            .bind(interval_hours)
            .bind(&input.parameters)
            .bind(input.is_active)
            .bind(next_run)
            .fetch_optional(pool)
            .await
    }

    /// Delete a schedule. Returns `true` when a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sync.schedules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
