//! Repository for the `quality.issues` table.
//!
//! Insertion honors suppression: an issue identical (rule, record, field)
//! to a suppressed one is silently dropped. Status updates enforce the
//! `open -> acknowledged? -> resolved | suppressed` lifecycle.

use parcelsync_core::jobs::issue_lifecycle;
use parcelsync_core::types::DbId;
use sqlx::PgPool;

use crate::models::issue::{IssueListQuery, NewIssue, QualityIssue, UpdateIssueStatus};

/// Column list for `quality.issues` queries.
const COLUMNS: &str = "\
    id, rule_id, job_id, table_name, field_name, record_id, issue_type, issue_value, \
    severity, status, detected_at, resolved_at, resolved_by";

/// Maximum page size for issue listing.
const MAX_LIMIT: i64 = 500;

/// Default page size for issue listing.
const DEFAULT_LIMIT: i64 = 100;

/// Provides insert/query/lifecycle operations for quality issues.
pub struct IssueRepo;

impl IssueRepo {
    /// Insert an open issue unless an identical one is suppressed.
    ///
    /// Returns the created row, or `None` when suppression applied.
    pub async fn insert_open(
        pool: &PgPool,
        issue: &NewIssue,
    ) -> Result<Option<QualityIssue>, sqlx::Error> {
        let suppressed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quality.issues \
             WHERE status = 'suppressed' \
               AND rule_id IS NOT DISTINCT FROM $1 \
               AND record_id = $2 \
               AND field_name IS NOT DISTINCT FROM $3",
        )
        .bind(issue.rule_id)
        .bind(&issue.record_id)
        .bind(&issue.field_name)
        .fetch_one(pool)
        .await?;
        if suppressed > 0 {
            return Ok(None);
        }

        let query = format!(
            "INSERT INTO quality.issues \
                 (rule_id, job_id, table_name, field_name, record_id, issue_type, \
                  issue_value, severity, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'open') \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QualityIssue>(&query)
            .bind(issue.rule_id)
            .bind(issue.job_id)
            .bind(&issue.table_name)
            .bind(&issue.field_name)
            .bind(&issue.record_id)
            .bind(&issue.issue_type)
            .bind(&issue.issue_value)
            .bind(issue.severity.as_str())
            .fetch_one(pool)
            .await
            .map(Some)
    }

    /// Insert a batch of issues, applying suppression row by row.
    /// Returns how many were actually created.
    pub async fn insert_batch(pool: &PgPool, issues: &[NewIssue]) -> Result<u64, sqlx::Error> {
        let mut created = 0u64;
        for issue in issues {
            if Self::insert_open(pool, issue).await?.is_some() {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Find one issue by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<QualityIssue>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quality.issues WHERE id = $1");
        sqlx::query_as::<_, QualityIssue>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List issues with optional filters and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &IssueListQuery,
    ) -> Result<Vec<QualityIssue>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        // Build conditions in a fixed order matching the binds below.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;
        if params.table_name.is_some() {
            conditions.push(format!("table_name = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.severity.is_some() {
            conditions.push(format!("severity = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.job_id.is_some() {
            conditions.push(format!("job_id = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM quality.issues \
             {where_clause} \
             ORDER BY detected_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, QualityIssue>(&query);
        if let Some(t) = &params.table_name {
            q = q.bind(t);
        }
        if let Some(s) = &params.status {
            q = q.bind(s);
        }
        if let Some(s) = &params.severity {
            q = q.bind(s);
        }
        if let Some(j) = params.job_id {
            q = q.bind(j);
        }
        q = q.bind(limit).bind(offset);
        q.fetch_all(pool).await
    }

    /// Count open issues per severity for one table (score input).
    pub async fn open_counts_for_table(
        pool: &PgPool,
        table_name: &str,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT severity, COUNT(*) FROM quality.issues \
             WHERE table_name = $1 AND status = 'open' \
             GROUP BY severity",
        )
        .bind(table_name)
        .fetch_all(pool)
        .await
    }

    /// Transition an issue's lifecycle status.
    ///
    /// Returns the updated row, or `None` when the issue does not exist or
    /// the transition is invalid.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        input: &UpdateIssueStatus,
    ) -> Result<Option<QualityIssue>, sqlx::Error> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        if !issue_lifecycle::can_transition(&current.status, &input.status) {
            return Ok(None);
        }

        let resolving = matches!(input.status.as_str(), "resolved" | "suppressed");
        let query = format!(
            "UPDATE quality.issues \
             SET status = $2, \
                 resolved_at = CASE WHEN $3 THEN NOW() ELSE resolved_at END, \
                 resolved_by = CASE WHEN $3 THEN $4 ELSE resolved_by END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QualityIssue>(&query)
            .bind(id)
            .bind(&input.status)
            .bind(resolving)
            .bind(input.resolved_by.as_deref().unwrap_or("operator"))
            .fetch_optional(pool)
            .await
    }
}
