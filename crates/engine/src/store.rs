//! Row-level access to the synced tables on the source and target
//! endpoints.
//!
//! Synced tables are dynamic — their names and column lists come from the
//! stored field configuration — so rows move through `to_jsonb` on reads
//! and `jsonb_populate_record` on writes, and record identity uses the
//! same canonical `pk1|pk2` string the diff planner produces
//! (`concat_ws('|', pk::text, ...)` on the SQL side).

use std::collections::HashSet;

use parcelsync_core::types::Row;
use serde_json::Value;
use sqlx::PgPool;

use crate::error::EngineError;

/// Hard cap on cached referential reference sets.
const REFERENCE_SET_CAP: i64 = 500_000;

/// Stateless row access helpers over dynamic tables.
pub struct RowStore;

impl RowStore {
    /// Fetch one batch of source rows in primary-key order.
    ///
    /// With a watermark bound, only rows strictly above it are returned;
    /// comparison happens in jsonb space, which orders ISO-8601
    /// timestamps, numerics, and text consistently for a single-typed
    /// column. Rows with a null watermark are included on full scans only.
    pub async fn fetch_source_batch(
        pool: &PgPool,
        table: &str,
        columns: &[String],
        pk_columns: &[String],
        watermark_column: Option<&str>,
        watermark: Option<&Value>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Row>, EngineError> {
        let table_sql = qualified_ident(table)?;
        let column_list = ident_list(columns)?;
        let order = order_by(pk_columns)?;

        let (where_clause, bound) = match (watermark_column, watermark) {
            (Some(wm), Some(bound)) => {
                let wm_sql = ident(wm)?;
                (format!("WHERE to_jsonb(t.{wm_sql}) > $1::jsonb"), Some(bound))
            }
            _ => (String::new(), None),
        };

        let query = format!(
            "SELECT to_jsonb(s) AS row FROM ( \
                 SELECT {column_list} FROM {table_sql} t \
                 {where_clause} \
                 ORDER BY {order} \
                 LIMIT {limit} OFFSET {offset} \
             ) s"
        );

        let mut q = sqlx::query_scalar::<_, Value>(&query);
        if let Some(bound) = bound {
            q = q.bind(bound);
        }
        let values = q.fetch_all(pool).await?;
        Ok(values.into_iter().filter_map(into_row).collect())
    }

    /// Fetch target rows matching the given canonical keys.
    pub async fn fetch_target_by_keys(
        pool: &PgPool,
        table: &str,
        columns: &[String],
        pk_columns: &[String],
        keys: &[String],
    ) -> Result<Vec<Row>, EngineError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let table_sql = qualified_ident(table)?;
        let column_list = ident_list(columns)?;
        let key_expr = key_expression(pk_columns)?;

        let query = format!(
            "SELECT to_jsonb(s) AS row FROM ( \
                 SELECT {column_list} FROM {table_sql} t \
                 WHERE {key_expr} = ANY($1) \
             ) s"
        );
        let values = sqlx::query_scalar::<_, Value>(&query)
            .bind(keys)
            .fetch_all(pool)
            .await?;
        Ok(values.into_iter().filter_map(into_row).collect())
    }

    /// All live canonical keys in the target table (tombstoned rows
    /// excluded so repeated full syncs do not re-delete).
    pub async fn list_target_keys(
        pool: &PgPool,
        table: &str,
        pk_columns: &[String],
        tombstone_column: Option<&str>,
    ) -> Result<HashSet<String>, EngineError> {
        let table_sql = qualified_ident(table)?;
        let key_expr = key_expression(pk_columns)?;
        let where_clause = match tombstone_column {
            Some(col) => format!("WHERE NOT COALESCE(t.{}, FALSE)", ident(col)?),
            None => String::new(),
        };
        let query = format!("SELECT {key_expr} FROM {table_sql} t {where_clause}");
        let keys = sqlx::query_scalar::<_, String>(&query).fetch_all(pool).await?;
        Ok(keys.into_iter().collect())
    }

    /// Insert one prepared row.
    pub async fn insert_row<'e, E>(
        executor: E,
        table: &str,
        columns: &[String],
        row: &Row,
    ) -> Result<(), EngineError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let table_sql = qualified_ident(table)?;
        let column_list = ident_list(columns)?;
        let query = format!(
            "INSERT INTO {table_sql} ({column_list}) \
             SELECT {column_list} FROM jsonb_populate_record(NULL::{table_sql}, $1) t"
        );
        sqlx::query(&query)
            .bind(Value::Object(row.clone()))
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Update the given columns of one row, addressed by primary key.
    pub async fn update_row<'e, E>(
        executor: E,
        table: &str,
        changed_columns: &[String],
        pk_columns: &[String],
        fields: &Row,
    ) -> Result<u64, EngineError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let table_sql = qualified_ident(table)?;
        let assignments = changed_columns
            .iter()
            .map(|c| ident(c).map(|i| format!("{i} = r.{i}")))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let key_match = pk_columns
            .iter()
            .map(|c| ident(c).map(|i| format!("u.{i} = r.{i}")))
            .collect::<Result<Vec<_>, _>>()?
            .join(" AND ");

        let query = format!(
            "UPDATE {table_sql} u SET {assignments} \
             FROM jsonb_populate_record(NULL::{table_sql}, $1) r \
             WHERE {key_match}"
        );
        let result = sqlx::query(&query)
            .bind(Value::Object(fields.clone()))
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Soft-delete rows by canonical key: set the tombstone column when
    /// configured, delete outright otherwise. Returns rows affected.
    pub async fn soft_delete(
        pool: &PgPool,
        table: &str,
        pk_columns: &[String],
        keys: &[String],
        tombstone_column: Option<&str>,
    ) -> Result<u64, EngineError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let table_sql = qualified_ident(table)?;
        let key_expr = key_expression_unqualified(pk_columns)?;

        let query = match tombstone_column {
            Some(col) => {
                let col_sql = ident(col)?;
                format!(
                    "UPDATE {table_sql} SET {col_sql} = TRUE WHERE {key_expr} = ANY($1)"
                )
            }
            None => format!("DELETE FROM {table_sql} WHERE {key_expr} = ANY($1)"),
        };
        let result = sqlx::query(&query).bind(keys).execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Distinct canonical values of one column, for referential rule
    /// caches. Capped; tables past the cap log a warning and the rule
    /// evaluates against the partial set.
    pub async fn reference_set(
        pool: &PgPool,
        table: &str,
        field: &str,
    ) -> Result<HashSet<String>, EngineError> {
        let table_sql = qualified_ident(table)?;
        let field_sql = ident(field)?;
        let query = format!(
            "SELECT DISTINCT {field_sql}::text FROM {table_sql} \
             WHERE {field_sql} IS NOT NULL LIMIT {REFERENCE_SET_CAP}"
        );
        let values = sqlx::query_scalar::<_, String>(&query).fetch_all(pool).await?;
        if values.len() as i64 == REFERENCE_SET_CAP {
            tracing::warn!(table, field, "Reference set truncated at cap");
        }
        Ok(values.into_iter().collect())
    }

    /// Sample one column's values with their record keys, for outlier
    /// detection. Values come back as text and are parsed client-side so
    /// non-numeric rows are skipped rather than failing the query.
    pub async fn sample_column(
        pool: &PgPool,
        table: &str,
        field: &str,
        pk_columns: &[String],
        limit: i64,
    ) -> Result<Vec<(String, f64)>, EngineError> {
        let table_sql = qualified_ident(table)?;
        let field_sql = ident(field)?;
        let key_expr = key_expression(pk_columns)?;
        let query = format!(
            "SELECT {key_expr} AS key, t.{field_sql}::text AS value \
             FROM {table_sql} t \
             WHERE t.{field_sql} IS NOT NULL \
             LIMIT {limit}"
        );
        let rows = sqlx::query_as::<_, (String, String)>(&query)
            .fetch_all(pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(key, text)| text.trim().parse::<f64>().ok().map(|v| (key, v)))
            .collect())
    }

    /// Total row count of a table.
    pub async fn count_rows(pool: &PgPool, table: &str) -> Result<i64, EngineError> {
        let table_sql = qualified_ident(table)?;
        let query = format!("SELECT COUNT(*) FROM {table_sql}");
        Ok(sqlx::query_scalar::<_, i64>(&query).fetch_one(pool).await?)
    }
}

// ---------------------------------------------------------------------------
// Identifier handling
// ---------------------------------------------------------------------------

/// Quote a single identifier, rejecting anything that is not a plain
/// SQL name. Configuration is trusted, but injection through a column
/// name would be silent and catastrophic, so names are validated anyway.
fn ident(name: &str) -> Result<String, EngineError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(format!("\"{name}\""))
    } else {
        Err(EngineError::InvalidIdentifier(name.to_string()))
    }
}

/// Quote a possibly schema-qualified table name.
fn qualified_ident(name: &str) -> Result<String, EngineError> {
    name.split('.')
        .map(ident)
        .collect::<Result<Vec<_>, _>>()
        .map(|parts| parts.join("."))
}

fn ident_list(columns: &[String]) -> Result<String, EngineError> {
    Ok(columns
        .iter()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

fn order_by(pk_columns: &[String]) -> Result<String, EngineError> {
    Ok(pk_columns
        .iter()
        .map(|c| ident(c).map(|i| format!("t.{i} ASC")))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

/// `concat_ws('|', t.pk1::text, t.pk2::text)` — the SQL twin of the diff
/// planner's canonical key string.
fn key_expression(pk_columns: &[String]) -> Result<String, EngineError> {
    let parts = pk_columns
        .iter()
        .map(|c| ident(c).map(|i| format!("t.{i}::text")))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    Ok(format!("concat_ws('|', {parts})"))
}

/// Key expression without a table alias, for UPDATE/DELETE statements.
fn key_expression_unqualified(pk_columns: &[String]) -> Result<String, EngineError> {
    let parts = pk_columns
        .iter()
        .map(|c| ident(c).map(|i| format!("{i}::text")))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    Ok(format!("concat_ws('|', {parts})"))
}

fn into_row(value: Value) -> Option<Row> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_are_quoted() {
        assert_eq!(ident("parcel_id").unwrap(), "\"parcel_id\"");
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        assert!(ident("name; DROP TABLE parcels").is_err());
        assert!(ident("a\"b").is_err());
        assert!(ident("").is_err());
        assert!(ident("1abc").is_err());
    }

    #[test]
    fn qualified_names_quote_each_part() {
        assert_eq!(qualified_ident("public.parcels").unwrap(), "\"public\".\"parcels\"");
        assert!(qualified_ident("public.par;cels").is_err());
    }

    #[test]
    fn key_expression_matches_planner_canonical_form() {
        let expr = key_expression(&["map_no".to_string(), "lot_no".to_string()]).unwrap();
        assert_eq!(expr, "concat_ws('|', t.\"map_no\"::text, t.\"lot_no\"::text)");
    }
}
