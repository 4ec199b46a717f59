//! Change detection: watermark-bounded pulls and per-row write planning.
//!
//! The detector pulls one batch of source rows, normalizes every value
//! through its column's type handler, and plans inserts/updates against
//! the matching target rows. Full syncs additionally compute the target
//! keys absent from the source for soft deletion.

use std::collections::{HashMap, HashSet};

use parcelsync_core::diff::{plan_row, primary_key_of, FieldSpec, KeyError, RowChange};
use parcelsync_core::handlers::{CompareOptions, Registry};
use parcelsync_core::types::Row;
use serde_json::Value;
use sqlx::PgPool;

use crate::error::EngineError;
use crate::store::RowStore;

// ---------------------------------------------------------------------------
// Batch types
// ---------------------------------------------------------------------------

/// A source row with its canonical record identity.
#[derive(Debug, Clone)]
pub struct KeyedRow {
    pub key: String,
    pub row: Row,
}

/// Why a pulled row cannot be processed.
#[derive(Debug)]
pub enum RowDefect {
    /// Primary key missing or null.
    InvalidKey(KeyError),
    /// A type handler could not extract a column's value.
    TypeMismatch { column: String },
}

/// One pulled and normalized source batch.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub rows: Vec<KeyedRow>,
    /// Rows rejected before planning, with their defect and best-effort
    /// record identity for logging.
    pub defects: Vec<(Option<String>, RowDefect)>,
}

// ---------------------------------------------------------------------------
// ChangeDetector
// ---------------------------------------------------------------------------

/// Plans the writes that bring one table into convergence.
pub struct ChangeDetector {
    registry: Registry,
    opts: CompareOptions,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            registry: Registry::default(),
            opts: CompareOptions::default(),
        }
    }
}

impl ChangeDetector {
    /// Pull one batch of source rows and normalize them.
    #[allow(clippy::too_many_arguments)]
    pub async fn pull_source_batch(
        &self,
        source: &PgPool,
        table: &str,
        fields: &[FieldSpec],
        pk_columns: &[String],
        watermark_column: Option<&str>,
        watermark: Option<&Value>,
        limit: i64,
        offset: i64,
    ) -> Result<SourceBatch, EngineError> {
        let columns: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let raw_rows = RowStore::fetch_source_batch(
            source,
            table,
            &columns,
            pk_columns,
            watermark_column,
            watermark,
            limit,
            offset,
        )
        .await?;

        let mut batch = SourceBatch::default();
        for raw in raw_rows {
            let key = primary_key_of(&raw, pk_columns);
            match self.extract_row(&raw, fields) {
                Ok(row) => match key {
                    Ok(key) => batch.rows.push(KeyedRow { key, row }),
                    Err(e) => batch.defects.push((None, RowDefect::InvalidKey(e))),
                },
                Err(column) => {
                    batch
                        .defects
                        .push((key.ok(), RowDefect::TypeMismatch { column }));
                }
            }
        }
        Ok(batch)
    }

    /// Plan writes for a batch of (possibly sanitized) source rows against
    /// the current target state.
    pub async fn plan_batch(
        &self,
        target: &PgPool,
        table: &str,
        fields: &[FieldSpec],
        pk_columns: &[String],
        rows: &[KeyedRow],
    ) -> Result<Vec<RowChange>, EngineError> {
        let columns: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let keys: Vec<String> = rows.iter().map(|r| r.key.clone()).collect();

        let target_rows =
            RowStore::fetch_target_by_keys(target, table, &columns, pk_columns, &keys).await?;
        let mut by_key: HashMap<String, Row> = HashMap::with_capacity(target_rows.len());
        for row in target_rows {
            match primary_key_of(&row, pk_columns) {
                Ok(key) => {
                    by_key.insert(key, self.extract_row(&row, fields).unwrap_or(row));
                }
                Err(e) => {
                    tracing::warn!(table, error = %e, "Target row with unusable key ignored");
                }
            }
        }

        let mut changes = Vec::with_capacity(rows.len());
        for keyed in rows {
            match plan_row(
                &keyed.row,
                by_key.get(&keyed.key),
                fields,
                &self.registry,
                &self.opts,
            ) {
                Ok(change) => changes.push(change),
                Err(e) => {
                    // The pull already rejected bad keys; reaching here
                    // means the row lost its key in sanitization, which a
                    // rule on a PK column could cause. Skip defensively.
                    tracing::warn!(table, key = %keyed.key, error = %e, "Unplannable row skipped");
                }
            }
        }
        Ok(changes)
    }

    /// Target keys absent from the full source key set (full sync only).
    pub async fn missing_in_source(
        &self,
        target: &PgPool,
        table: &str,
        pk_columns: &[String],
        tombstone_column: Option<&str>,
        source_keys: &HashSet<String>,
    ) -> Result<Vec<String>, EngineError> {
        let target_keys =
            RowStore::list_target_keys(target, table, pk_columns, tombstone_column).await?;
        Ok(target_keys
            .into_iter()
            .filter(|k| !source_keys.contains(k))
            .collect())
    }

    /// Normalize every configured column through its type handler.
    /// Returns the offending column name on extraction failure.
    fn extract_row(&self, raw: &Row, fields: &[FieldSpec]) -> Result<Row, String> {
        let mut row = Row::new();
        for field in fields {
            let value = raw.get(&field.name).cloned().unwrap_or(Value::Null);
            let handler = self.registry.resolve(&field.declared_type);
            match handler.extract(&field.name, &value) {
                Some(extracted) => {
                    row.insert(field.name.clone(), extracted);
                }
                None => return Err(field.name.clone()),
            }
        }
        Ok(row)
    }
}

/// Larger of two watermark values, compared the way jsonb orders them:
/// numbers numerically, strings lexicographically (ISO-8601 timestamps
/// order correctly), mixed types by string form.
pub(crate) fn max_watermark(a: Value, b: Value) -> Value {
    let a_wins = match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().unwrap_or(f64::MIN) >= y.as_f64().unwrap_or(f64::MIN)
        }
        (Value::String(x), Value::String(y)) => x >= y,
        _ => a.to_string() >= b.to_string(),
    };
    if a_wins {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn max_watermark_orders_iso_timestamps() {
        let a = json!("2026-08-06T14:30:00Z");
        let b = json!("2026-08-06T09:00:00Z");
        assert_eq!(max_watermark(a.clone(), b), a);
    }

    #[test]
    fn max_watermark_orders_numbers() {
        assert_eq!(max_watermark(json!(17), json!(42)), json!(42));
    }

    #[test]
    fn extract_rejects_unparseable_column() {
        let detector = ChangeDetector::default();
        let fields = vec![
            FieldSpec {
                name: "pk".to_string(),
                declared_type: "bigint".to_string(),
                is_primary_key: true,
                nullable: false,
            },
            FieldSpec {
                name: "boundary".to_string(),
                declared_type: "geometry".to_string(),
                is_primary_key: false,
                nullable: true,
            },
        ];
        let mut raw = Row::new();
        raw.insert("pk".to_string(), json!(1));
        raw.insert("boundary".to_string(), json!("not wkt at all ("));
        assert_eq!(detector.extract_row(&raw, &fields), Err("boundary".to_string()));
    }

    #[test]
    fn extract_normalizes_geometry_strings() {
        let detector = ChangeDetector::default();
        let fields = vec![FieldSpec {
            name: "boundary".to_string(),
            declared_type: "geometry".to_string(),
            is_primary_key: false,
            nullable: true,
        }];
        let mut raw = Row::new();
        raw.insert("boundary".to_string(), json!("POINT (1 2)"));
        let row = detector.extract_row(&raw, &fields).unwrap();
        assert_eq!(row["boundary"]["type"], "Point");
    }
}
