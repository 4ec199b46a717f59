//! Field-level row diff planning.
//!
//! Given one source row and the matching target row (if any), decide what
//! write — if any — brings the target into convergence. Field equivalence
//! is delegated to the registered type handler for each column's declared
//! type, so geometry, JSON, and temporal columns compare semantically
//! rather than byte-wise.

use serde_json::Value;

use crate::handlers::{CompareOptions, Registry};
use crate::types::Row;

/// Separator joining composite primary-key components into the canonical
/// record identity string.
const KEY_SEPARATOR: char = '|';

// ---------------------------------------------------------------------------
// Field specification
// ---------------------------------------------------------------------------

/// Column description the planner works from (the engine materializes
/// these from the stored field configuration).
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub declared_type: String,
    pub is_primary_key: bool,
    pub nullable: bool,
}

// ---------------------------------------------------------------------------
// Planned changes
// ---------------------------------------------------------------------------

/// The write planned for one source row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    /// Row absent in target: insert it whole.
    Insert { key: String, row: Row },
    /// Row present but differing: update carries only the differing fields
    /// plus the primary key.
    Update { key: String, fields: Row },
    /// All fields equivalent; nothing to write.
    Skip { key: String },
}

impl RowChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Insert { key, .. } | Self::Update { key, .. } | Self::Skip { key } => key,
        }
    }
}

/// Why a row could not be identified.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Primary key component {0} is missing")]
    MissingComponent(String),
    #[error("Primary key component {0} is null")]
    NullComponent(String),
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Canonical record identity from the primary-key columns.
///
/// All components of a composite key participate; a missing or null
/// component rejects the row.
pub fn primary_key_of(row: &Row, pk_columns: &[String]) -> Result<String, KeyError> {
    let mut parts = Vec::with_capacity(pk_columns.len());
    for column in pk_columns {
        let value = row
            .get(column)
            .ok_or_else(|| KeyError::MissingComponent(column.clone()))?;
        if value.is_null() {
            return Err(KeyError::NullComponent(column.clone()));
        }
        parts.push(component_string(value));
    }
    Ok(parts.join(&KEY_SEPARATOR.to_string()))
}

/// Plan the write for one source row against its target counterpart.
pub fn plan_row(
    source: &Row,
    target: Option<&Row>,
    fields: &[FieldSpec],
    registry: &Registry,
    opts: &CompareOptions,
) -> Result<RowChange, KeyError> {
    let pk_columns: Vec<String> = fields
        .iter()
        .filter(|f| f.is_primary_key)
        .map(|f| f.name.clone())
        .collect();
    let key = primary_key_of(source, &pk_columns)?;

    let Some(target) = target else {
        return Ok(RowChange::Insert {
            key,
            row: source.clone(),
        });
    };

    let mut changed = Row::new();
    for field in fields.iter().filter(|f| !f.is_primary_key) {
        let source_value = source.get(&field.name).unwrap_or(&Value::Null);
        let target_value = target.get(&field.name).unwrap_or(&Value::Null);
        let handler = registry.resolve(&field.declared_type);
        if handler.differ(source_value, target_value, opts) {
            changed.insert(field.name.clone(), source_value.clone());
        }
    }

    if changed.is_empty() {
        return Ok(RowChange::Skip { key });
    }
    // Carry the primary key so the write can address the row.
    for column in &pk_columns {
        if let Some(value) = source.get(column) {
            changed.insert(column.clone(), value.clone());
        }
    }
    Ok(RowChange::Update {
        key,
        fields: changed,
    })
}

fn component_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Vec<FieldSpec> {
        vec![
            spec("pk", "bigint", true),
            spec("name", "text", false),
            spec("ssn", "text", false),
            spec("updated_at", "timestamptz", false),
        ]
    }

    fn spec(name: &str, declared: &str, pk: bool) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            declared_type: declared.to_string(),
            is_primary_key: pk,
            nullable: !pk,
        }
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn plan(source: &Row, target: Option<&Row>) -> RowChange {
        plan_row(
            source,
            target,
            &fields(),
            &Registry::default(),
            &CompareOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn absent_in_target_is_insert() {
        let source = row(&[("pk", json!(1)), ("name", json!("Alice"))]);
        assert_matches::assert_matches!(plan(&source, None), RowChange::Insert { .. });
    }

    #[test]
    fn equivalent_rows_skip() {
        let source = row(&[("pk", json!(2)), ("name", json!("Bob"))]);
        let target = row(&[("pk", json!(2)), ("name", json!("Bob"))]);
        assert_matches::assert_matches!(plan(&source, Some(&target)), RowChange::Skip { .. });
    }

    #[test]
    fn update_carries_only_differing_fields_plus_key() {
        let source = row(&[
            ("pk", json!(2)),
            ("name", json!("Robert")),
            ("ssn", json!("222-33-4444")),
        ]);
        let target = row(&[
            ("pk", json!(2)),
            ("name", json!("Bob")),
            ("ssn", json!("222-33-4444")),
        ]);
        match plan(&source, Some(&target)) {
            RowChange::Update { key, fields } => {
                assert_eq!(key, "2");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["name"], json!("Robert"));
                assert_eq!(fields["pk"], json!(2));
                assert!(!fields.contains_key("ssn"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn semantic_equivalence_uses_type_handlers() {
        let source = row(&[("pk", json!(1)), ("updated_at", json!("2026-08-06T14:30:00Z"))]);
        let target = row(&[("pk", json!(1)), ("updated_at", json!("2026-08-06 14:30:00"))]);
        assert_matches::assert_matches!(plan(&source, Some(&target)), RowChange::Skip { .. });
    }

    #[test]
    fn null_primary_key_rejected() {
        let source = row(&[("pk", Value::Null), ("name", json!("x"))]);
        let err = plan_row(
            &source,
            None,
            &fields(),
            &Registry::default(),
            &CompareOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, KeyError::NullComponent("pk".to_string()));
    }

    #[test]
    fn missing_composite_component_rejected() {
        let specs = vec![spec("a", "text", true), spec("b", "text", true)];
        let source = row(&[("a", json!("x"))]);
        let err = plan_row(
            &source,
            None,
            &specs,
            &Registry::default(),
            &CompareOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, KeyError::MissingComponent("b".to_string()));
    }

    #[test]
    fn composite_key_joins_all_components() {
        let source = row(&[("map", json!("12A")), ("lot", json!(7))]);
        let key = primary_key_of(&source, &["map".to_string(), "lot".to_string()]).unwrap();
        assert_eq!(key, "12A|7");
    }

    #[test]
    fn null_vs_value_differs() {
        let source = row(&[("pk", json!(1)), ("name", json!("Alice"))]);
        let target = row(&[("pk", json!(1)), ("name", Value::Null)]);
        assert_matches::assert_matches!(plan(&source, Some(&target)), RowChange::Update { .. });
    }
}
