//! PII sanitization applied on the down-sync direction.
//!
//! Each (table, field) with an active rule gets its source value replaced
//! by a sanitized surrogate before it is written to the training target.
//! Every decision — including degradations and failures — produces an
//! audit entry; fields without rules pass through unchanged.

pub mod strategies;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::types::Row;
pub use strategies::{Strategy, REDACTED};

// ---------------------------------------------------------------------------
// Rule and audit types
// ---------------------------------------------------------------------------

/// The active sanitization rule for one field, resolved per table.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub strategy: Strategy,
    /// Whether the target column accepts NULL; the `null` strategy
    /// degrades to `redact` when it does not.
    pub nullable: bool,
}

/// What actually happened to one field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The configured strategy was applied as-is.
    Applied,
    /// `null` was requested on a non-nullable column; redacted instead.
    DegradedToRedact,
    /// The strategy failed; the value was redacted as a fallback.
    SanitizationError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::DegradedToRedact => "degraded_to_redact",
            Self::SanitizationError => "sanitization_error",
        }
    }
}

/// Audit record for one sanitized value.
///
/// The tokenize original->surrogate mapping lives only here; it is never
/// written to the target.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub field: String,
    pub strategy: Strategy,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Sanitizer
// ---------------------------------------------------------------------------

/// Applies resolved field rules to rows. The key feeds the deterministic
/// `hash` and `tokenize` strategies so same input -> same output within a
/// job.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    key: Vec<u8>,
}

impl Sanitizer {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Apply each rule to its field in place, returning the audit trail.
    ///
    /// Null source values are left untouched (there is nothing to
    /// sanitize) and produce no audit entry. `record_pk` is the canonical
    /// primary-key string, seeding the deterministic fake-value strategies.
    pub fn sanitize_row(
        &self,
        rules: &BTreeMap<String, FieldRule>,
        row: &mut Row,
        record_pk: &str,
    ) -> Vec<AuditEntry> {
        let mut audit = Vec::new();

        for (field, rule) in rules {
            let Some(value) = row.get(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let entry = match strategies::apply(
                rule.strategy,
                value,
                rule.nullable,
                &self.key,
                record_pk,
                field,
            ) {
                Ok(strategies::Applied { value, degraded, token }) => {
                    row.insert(field.clone(), value);
                    AuditEntry {
                        field: field.clone(),
                        strategy: rule.strategy,
                        outcome: if degraded {
                            Outcome::DegradedToRedact
                        } else {
                            Outcome::Applied
                        },
                        token,
                        error: None,
                    }
                }
                Err(e) => {
                    row.insert(field.clone(), Value::String(REDACTED.to_string()));
                    AuditEntry {
                        field: field.clone(),
                        strategy: rule.strategy,
                        outcome: Outcome::SanitizationError,
                        token: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            audit.push(entry);
        }

        audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(entries: &[(&str, Strategy, bool)]) -> BTreeMap<String, FieldRule> {
        entries
            .iter()
            .map(|(f, s, n)| {
                (
                    f.to_string(),
                    FieldRule {
                        strategy: *s,
                        nullable: *n,
                    },
                )
            })
            .collect()
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn fields_without_rules_pass_through() {
        let sanitizer = Sanitizer::new("key");
        let mut r = row(&[("name", json!("Alice")), ("ssn", json!("111-22-3333"))]);
        let audit = sanitizer.sanitize_row(&rules(&[("ssn", Strategy::Mask, true)]), &mut r, "1");
        assert_eq!(r["name"], json!("Alice"));
        assert_eq!(r["ssn"], json!("XXX-XX-XXXX"));
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].outcome, Outcome::Applied);
    }

    #[test]
    fn null_values_are_skipped() {
        let sanitizer = Sanitizer::new("key");
        let mut r = row(&[("ssn", Value::Null)]);
        let audit = sanitizer.sanitize_row(&rules(&[("ssn", Strategy::Mask, true)]), &mut r, "1");
        assert!(audit.is_empty());
        assert!(r["ssn"].is_null());
    }

    #[test]
    fn absent_fields_are_skipped() {
        let sanitizer = Sanitizer::new("key");
        let mut r = row(&[]);
        let audit = sanitizer.sanitize_row(&rules(&[("ssn", Strategy::Mask, true)]), &mut r, "1");
        assert!(audit.is_empty());
    }

    #[test]
    fn null_strategy_degrades_on_non_nullable_column() {
        let sanitizer = Sanitizer::new("key");
        let mut r = row(&[("ssn", json!("111-22-3333"))]);
        let audit =
            sanitizer.sanitize_row(&rules(&[("ssn", Strategy::Null, false)]), &mut r, "1");
        assert_eq!(r["ssn"], json!(REDACTED));
        assert_eq!(audit[0].outcome, Outcome::DegradedToRedact);
    }

    #[test]
    fn null_strategy_nulls_nullable_column() {
        let sanitizer = Sanitizer::new("key");
        let mut r = row(&[("ssn", json!("111-22-3333"))]);
        let audit = sanitizer.sanitize_row(&rules(&[("ssn", Strategy::Null, true)]), &mut r, "1");
        assert!(r["ssn"].is_null());
        assert_eq!(audit[0].outcome, Outcome::Applied);
    }

    #[test]
    fn tokenize_mapping_appears_only_in_audit() {
        let sanitizer = Sanitizer::new("key");
        let mut r = row(&[("account", json!("ACCT-9981"))]);
        let audit =
            sanitizer.sanitize_row(&rules(&[("account", Strategy::Tokenize, true)]), &mut r, "1");
        let token = r["account"].as_str().unwrap();
        assert!(token.starts_with("tok_"));
        assert_eq!(audit[0].token.as_deref(), Some(token));
    }

    #[test]
    fn audit_entry_per_sanitized_field() {
        let sanitizer = Sanitizer::new("key");
        let mut r = row(&[("ssn", json!("111-22-3333")), ("owner", json!("Alice"))]);
        let audit = sanitizer.sanitize_row(
            &rules(&[("ssn", Strategy::Mask, true), ("owner", Strategy::FakeName, true)]),
            &mut r,
            "42",
        );
        assert_eq!(audit.len(), 2);
    }
}
