//! Repository for `quality.alerts` and their per-report dispatch ledger.

use parcelsync_core::types::DbId;
use sqlx::PgPool;

use crate::models::alert::{NewAlert, QualityAlert, UpdateAlert};

/// Column list for `quality.alerts` queries.
const COLUMNS: &str = "\
    id, alert_type, table_name, field_name, severity_threshold, conditions, \
    recipients, channels, is_active, created_at, updated_at";

/// Provides CRUD and dispatch-ledger operations for quality alerts.
pub struct AlertRepo;

impl AlertRepo {
    /// Active alerts.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<QualityAlert>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quality.alerts WHERE is_active ORDER BY id");
        sqlx::query_as::<_, QualityAlert>(&query).fetch_all(pool).await
    }

    /// All alerts.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<QualityAlert>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quality.alerts ORDER BY id");
        sqlx::query_as::<_, QualityAlert>(&query).fetch_all(pool).await
    }

    /// Create an alert.
    pub async fn create(pool: &PgPool, input: &NewAlert) -> Result<QualityAlert, sqlx::Error> {
        let query = format!(
            "INSERT INTO quality.alerts \
                 (alert_type, table_name, field_name, severity_threshold, conditions, \
                  recipients, channels, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QualityAlert>(&query)
            .bind(&input.alert_type)
            .bind(&input.table_name)
            .bind(&input.field_name)
            .bind(&input.severity_threshold)
            .bind(&input.conditions)
            .bind(&input.recipients)
            .bind(&input.channels)
            .bind(input.is_active)
            .fetch_one(pool)
            .await
    }

    /// Update an alert.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateAlert,
    ) -> Result<Option<QualityAlert>, sqlx::Error> {
        let query = format!(
            "UPDATE quality.alerts \
             SET severity_threshold = COALESCE($2, severity_threshold), \
                 conditions = COALESCE($3, conditions), \
                 recipients = COALESCE($4, recipients), \
                 channels = COALESCE($5, channels), \
                 is_active = COALESCE($6, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QualityAlert>(&query)
            .bind(id)
            .bind(&input.severity_threshold)
            .bind(&input.conditions)
            .bind(&input.recipients)
            .bind(&input.channels)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Delete an alert. Returns `true` when a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quality.alerts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Claim the (alert, report) dispatch slot.
    ///
    /// Returns `true` exactly once per pair, so an alert is dispatched at
    /// most once per report no matter how often the report is re-examined.
    pub async fn record_dispatch(
        pool: &PgPool,
        alert_id: DbId,
        report_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO quality.alert_dispatches (alert_id, report_id) \
             VALUES ($1, $2) \
             ON CONFLICT (alert_id, report_id) DO NOTHING",
        )
        .bind(alert_id)
        .bind(report_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
