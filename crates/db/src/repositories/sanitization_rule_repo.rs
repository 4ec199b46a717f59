//! Repository for the `sync.sanitization_rules` table.
//!
//! The one-active-rule-per-(table, field) invariant is enforced by a
//! partial unique index; creation surfaces the conflict to the caller.

use parcelsync_core::sanitize::Strategy;
use parcelsync_core::types::DbId;
use parcelsync_core::CoreError;
use sqlx::PgPool;

use crate::models::sanitization_rule::{
    NewSanitizationRule, SanitizationRule, UpdateSanitizationRule,
};

/// Column list for `sync.sanitization_rules` queries.
const COLUMNS: &str =
    "id, table_name, field_name, strategy, is_active, created_by, created_at, updated_at";

/// Provides CRUD operations for sanitization rules.
pub struct SanitizationRuleRepo;

impl SanitizationRuleRepo {
    /// Active rules for one table.
    pub async fn list_active_for_table(
        pool: &PgPool,
        table_name: &str,
    ) -> Result<Vec<SanitizationRule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync.sanitization_rules \
             WHERE table_name = $1 AND is_active \
             ORDER BY field_name ASC"
        );
        sqlx::query_as::<_, SanitizationRule>(&query)
            .bind(table_name)
            .fetch_all(pool)
            .await
    }

    /// All rules, newest first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<SanitizationRule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync.sanitization_rules ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, SanitizationRule>(&query).fetch_all(pool).await
    }

    /// Validate the strategy tag before it reaches the database.
    pub fn validate(input: &NewSanitizationRule) -> Result<(), CoreError> {
        input
            .strategy
            .parse::<Strategy>()
            .map(|_| ())
            .map_err(CoreError::ConfigInvalid)
    }

    /// Create a rule. A duplicate active (table, field) pair fails with
    /// the partial unique index violation.
    pub async fn create(
        pool: &PgPool,
        input: &NewSanitizationRule,
    ) -> Result<SanitizationRule, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync.sanitization_rules \
                 (table_name, field_name, strategy, is_active, created_by) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SanitizationRule>(&query)
            .bind(&input.table_name)
            .bind(&input.field_name)
            .bind(&input.strategy)
            .bind(input.is_active)
            .bind(input.created_by.as_deref().unwrap_or("system"))
            .fetch_one(pool)
            .await
    }

    /// Update strategy and/or active flag.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSanitizationRule,
    ) -> Result<Option<SanitizationRule>, sqlx::Error> {
        let query = format!(
            "UPDATE sync.sanitization_rules \
             SET strategy = COALESCE($2, strategy), \
                 is_active = COALESCE($3, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SanitizationRule>(&query)
            .bind(id)
            .bind(&input.strategy)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Delete a rule. Returns `true` when a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sync.sanitization_rules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
