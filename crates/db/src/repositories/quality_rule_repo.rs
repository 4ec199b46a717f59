//! Repository for the `quality.rules` table.
//!
//! `rule_config` is validated against the schema for its rule type before
//! a rule can be created or re-activated.

use parcelsync_core::quality::rules::{validate_config, RuleType};
use parcelsync_core::severity::Severity;
use parcelsync_core::types::DbId;
use parcelsync_core::CoreError;
use sqlx::PgPool;

use crate::models::quality_rule::{NewQualityRule, QualityRule, UpdateQualityRule};

/// Column list for `quality.rules` queries.
const COLUMNS: &str = "\
    id, table_name, field_name, rule_type, rule_config, severity, is_active, \
    created_at, updated_at";

/// Provides CRUD operations for quality rules.
pub struct QualityRuleRepo;

impl QualityRuleRepo {
    /// Active rules for one table.
    pub async fn list_active_for_table(
        pool: &PgPool,
        table_name: &str,
    ) -> Result<Vec<QualityRule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM quality.rules \
             WHERE table_name = $1 AND is_active \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, QualityRule>(&query)
            .bind(table_name)
            .fetch_all(pool)
            .await
    }

    /// All rules, optionally filtered by table.
    pub async fn list(
        pool: &PgPool,
        table_name: Option<&str>,
    ) -> Result<Vec<QualityRule>, sqlx::Error> {
        match table_name {
            Some(t) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM quality.rules WHERE table_name = $1 ORDER BY id ASC"
                );
                sqlx::query_as::<_, QualityRule>(&query).bind(t).fetch_all(pool).await
            }
            None => {
                let query = format!("SELECT {COLUMNS} FROM quality.rules ORDER BY id ASC");
                sqlx::query_as::<_, QualityRule>(&query).fetch_all(pool).await
            }
        }
    }

    /// Find one rule by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<QualityRule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quality.rules WHERE id = $1");
        sqlx::query_as::<_, QualityRule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Activation-time validation: rule type, severity, and config schema.
    pub fn validate(input: &NewQualityRule) -> Result<(), CoreError> {
        let rule_type: RuleType = input
            .rule_type
            .parse()
            .map_err(CoreError::ConfigInvalid)?;
        input
            .severity
            .parse::<Severity>()
            .map_err(CoreError::ConfigInvalid)?;
        validate_config(rule_type, &input.rule_config)
    }

    /// Create a rule. Callers must run [`validate`](Self::validate) first.
    pub async fn create(pool: &PgPool, input: &NewQualityRule) -> Result<QualityRule, sqlx::Error> {
        let query = format!(
            "INSERT INTO quality.rules \
                 (table_name, field_name, rule_type, rule_config, severity, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QualityRule>(&query)
            .bind(&input.table_name)
            .bind(&input.field_name)
            .bind(&input.rule_type)
            .bind(&input.rule_config)
            .bind(&input.severity)
            .bind(input.is_active)
            .fetch_one(pool)
            .await
    }

    /// Update config, severity, and/or active flag.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateQualityRule,
    ) -> Result<Option<QualityRule>, sqlx::Error> {
        let query = format!(
            "UPDATE quality.rules \
             SET rule_config = COALESCE($2, rule_config), \
                 severity = COALESCE($3, severity), \
                 is_active = COALESCE($4, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QualityRule>(&query)
            .bind(id)
            .bind(&input.rule_config)
            .bind(&input.severity)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Delete a rule. Returns `true` when a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quality.rules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
