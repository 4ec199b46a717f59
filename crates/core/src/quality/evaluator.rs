//! Rule evaluator — pure logic, no database access.
//!
//! Evaluates all active rules against a single candidate row, returning
//! zero or more violations. One rule may yield multiple violations for a
//! multi-value (array) field. `statistical_outlier` rules are evaluated
//! over a column distribution by the report runner, not here.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::expr::Expr;
use super::rules::{QualityRule, RuleType, RuleViolation};

/// Cross-row context the evaluator needs: cached reference sets for
/// `referential` rules, keyed by (ref_table, ref_field). Values are the
/// canonical string forms of the reference column.
#[derive(Debug, Default)]
pub struct EvalContext {
    pub reference_sets: HashMap<(String, String), HashSet<String>>,
}

impl EvalContext {
    /// Canonical string form used for reference-set membership.
    pub fn canonical(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Evaluate all rules against a single data record.
pub fn evaluate_row(rules: &[QualityRule], row: &crate::types::Row, ctx: &EvalContext) -> Vec<RuleViolation> {
    let mut violations = Vec::new();
    for rule in rules {
        evaluate_single_rule(rule, row, ctx, &mut violations);
    }
    violations
}

fn evaluate_single_rule(
    rule: &QualityRule,
    row: &crate::types::Row,
    ctx: &EvalContext,
    out: &mut Vec<RuleViolation>,
) {
    match rule.rule_type {
        RuleType::CustomExpression => {
            if let Some(v) = evaluate_expression(rule, row) {
                out.push(v);
            }
        }
        RuleType::StatisticalOutlier => {}
        _ => {
            let Some(field) = rule.field.as_deref() else {
                // Field-level rule without a field: skip rather than fail
                // every row against a misconfigured rule.
                tracing::warn!(rule_id = rule.id, "Field-level rule has no field; skipping");
                return;
            };
            let value = row.get(field);

            // Multi-value fields: apply the check per element.
            if let Some(Value::Array(elements)) = value {
                if rule.rule_type != RuleType::NotNull {
                    for element in elements {
                        if let Some(v) = check_value(rule, Some(element), ctx) {
                            out.push(v);
                        }
                    }
                    return;
                }
            }
            if let Some(v) = check_value(rule, value, ctx) {
                out.push(v);
            }
        }
    }
}

fn violation(rule: &QualityRule, issue_type: &str, value: Option<&Value>) -> RuleViolation {
    RuleViolation {
        rule_id: Some(rule.id),
        field: rule.field.clone(),
        issue_type: issue_type.to_string(),
        issue_value: value.cloned(),
        severity: rule.severity,
    }
}

fn check_value(
    rule: &QualityRule,
    value: Option<&Value>,
    ctx: &EvalContext,
) -> Option<RuleViolation> {
    match rule.rule_type {
        RuleType::NotNull => check_not_null(rule, value),
        RuleType::Range => check_range(rule, value),
        RuleType::Regex => check_regex(rule, value),
        RuleType::Enum => check_enum(rule, value),
        RuleType::Referential => check_referential(rule, value, ctx),
        RuleType::CustomExpression | RuleType::StatisticalOutlier => None,
    }
}

/// Fails when the value is null, absent, or an empty string.
fn check_not_null(rule: &QualityRule, value: Option<&Value>) -> Option<RuleViolation> {
    match value {
        None | Some(Value::Null) => Some(violation(rule, "not_null", value)),
        Some(Value::String(s)) if s.is_empty() => Some(violation(rule, "not_null", value)),
        _ => None,
    }
}

/// `{min?, max?, inclusive?}`; non-numeric values fail with `type_mismatch`.
fn check_range(rule: &QualityRule, value: Option<&Value>) -> Option<RuleViolation> {
    let value = non_null(value)?;
    let Some(num) = as_number(value) else {
        return Some(violation(rule, "type_mismatch", Some(value)));
    };
    let inclusive = rule
        .config
        .get("inclusive")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let min = rule.config.get("min").and_then(Value::as_f64);
    let max = rule.config.get("max").and_then(Value::as_f64);

    let below = min.is_some_and(|m| if inclusive { num < m } else { num <= m });
    let above = max.is_some_and(|m| if inclusive { num > m } else { num >= m });
    if below || above {
        Some(violation(rule, "range", Some(value)))
    } else {
        None
    }
}

/// `{pattern, flags?}`; non-string values are coerced to their string form.
fn check_regex(rule: &QualityRule, value: Option<&Value>) -> Option<RuleViolation> {
    let value = non_null(value)?;
    let pattern = rule.config.get("pattern").and_then(Value::as_str)?;
    let case_insensitive = rule
        .config
        .get("flags")
        .and_then(Value::as_str)
        .is_some_and(|f| f.contains('i'));

    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build();
    let re = match re {
        Ok(re) => re,
        // Invalid patterns are rejected at activation; a stale one skips.
        Err(_) => return None,
    };
    let s = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if re.is_match(&s) {
        None
    } else {
        Some(violation(rule, "regex", Some(value)))
    }
}

/// `{values}`; set membership with numeric/string coercion.
fn check_enum(rule: &QualityRule, value: Option<&Value>) -> Option<RuleViolation> {
    let value = non_null(value)?;
    let allowed = rule.config.get("values").and_then(Value::as_array)?;
    let matches = allowed.iter().any(|candidate| {
        candidate == value
            || match (as_number(candidate), as_number(value)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    });
    if matches {
        None
    } else {
        Some(violation(rule, "enum", Some(value)))
    }
}

/// `{ref_table, ref_field}`; fails when the cached reference set does not
/// contain the value. A missing cache entry skips (the report runner could
/// not load the reference table; that is logged there).
fn check_referential(
    rule: &QualityRule,
    value: Option<&Value>,
    ctx: &EvalContext,
) -> Option<RuleViolation> {
    let value = non_null(value)?;
    let ref_table = rule.config.get("ref_table").and_then(Value::as_str)?;
    let ref_field = rule.config.get("ref_field").and_then(Value::as_str)?;
    let set = ctx
        .reference_sets
        .get(&(ref_table.to_string(), ref_field.to_string()))?;
    if set.contains(&EvalContext::canonical(value)) {
        None
    } else {
        Some(violation(rule, "referential", Some(value)))
    }
}

fn evaluate_expression(rule: &QualityRule, row: &crate::types::Row) -> Option<RuleViolation> {
    let expr_src = rule.config.get("expr").and_then(Value::as_str)?;
    let expr = match Expr::parse(expr_src) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(rule_id = rule.id, error = %e, "Invalid expression rule; skipping");
            return None;
        }
    };
    if expr.eval(row) {
        None
    } else {
        Some(RuleViolation {
            rule_id: Some(rule.id),
            field: rule.field.clone(),
            issue_type: "custom_expression".to_string(),
            issue_value: None,
            severity: rule.severity,
        })
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(v) if !v.is_null() => Some(v),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use serde_json::json;

    fn make_rule(rule_type: RuleType, field: Option<&str>, config: Value) -> QualityRule {
        QualityRule {
            id: 1,
            table: "parcels".to_string(),
            field: field.map(String::from),
            rule_type,
            config,
            severity: Severity::Error,
        }
    }

    fn row(pairs: &[(&str, Value)]) -> crate::types::Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn ctx() -> EvalContext {
        EvalContext::default()
    }

    // -- not_null -----------------------------------------------------------

    #[test]
    fn not_null_passes_with_value() {
        let rule = make_rule(RuleType::NotNull, Some("parcel_id"), json!({}));
        let r = row(&[("parcel_id", json!("12-34"))]);
        assert!(evaluate_row(&[rule], &r, &ctx()).is_empty());
    }

    #[test]
    fn not_null_fails_missing_null_and_empty() {
        let rule = make_rule(RuleType::NotNull, Some("parcel_id"), json!({}));
        for r in [row(&[]), row(&[("parcel_id", Value::Null)]), row(&[("parcel_id", json!(""))])] {
            let violations = evaluate_row(std::slice::from_ref(&rule), &r, &ctx());
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].issue_type, "not_null");
        }
    }

    // -- range --------------------------------------------------------------

    #[test]
    fn range_inclusive_bounds() {
        let rule = make_rule(RuleType::Range, Some("acres"), json!({"min": 0, "max": 100}));
        assert!(evaluate_row(std::slice::from_ref(&rule), &row(&[("acres", json!(0))]), &ctx()).is_empty());
        assert!(evaluate_row(std::slice::from_ref(&rule), &row(&[("acres", json!(100))]), &ctx()).is_empty());
        assert_eq!(
            evaluate_row(std::slice::from_ref(&rule), &row(&[("acres", json!(101))]), &ctx()).len(),
            1
        );
    }

    #[test]
    fn range_exclusive_bounds() {
        let rule = make_rule(
            RuleType::Range,
            Some("acres"),
            json!({"min": 0, "inclusive": false}),
        );
        assert_eq!(
            evaluate_row(std::slice::from_ref(&rule), &row(&[("acres", json!(0))]), &ctx()).len(),
            1
        );
    }

    #[test]
    fn range_non_numeric_is_type_mismatch() {
        let rule = make_rule(RuleType::Range, Some("acres"), json!({"min": 0}));
        let violations =
            evaluate_row(&[rule], &row(&[("acres", json!("two and a half"))]), &ctx());
        assert_eq!(violations[0].issue_type, "type_mismatch");
    }

    #[test]
    fn range_accepts_numeric_strings() {
        let rule = make_rule(RuleType::Range, Some("acres"), json!({"min": 0}));
        assert!(evaluate_row(&[rule], &row(&[("acres", json!("2.5"))]), &ctx()).is_empty());
    }

    #[test]
    fn range_ignores_null() {
        let rule = make_rule(RuleType::Range, Some("acres"), json!({"min": 0}));
        assert!(evaluate_row(&[rule], &row(&[("acres", Value::Null)]), &ctx()).is_empty());
    }

    // -- regex --------------------------------------------------------------

    #[test]
    fn regex_match_and_mismatch() {
        let rule = make_rule(
            RuleType::Regex,
            Some("parcel_id"),
            json!({"pattern": r"^\d{2}-\d{3}$"}),
        );
        assert!(evaluate_row(std::slice::from_ref(&rule), &row(&[("parcel_id", json!("12-345"))]), &ctx())
            .is_empty());
        assert_eq!(
            evaluate_row(std::slice::from_ref(&rule), &row(&[("parcel_id", json!("nope"))]), &ctx()).len(),
            1
        );
    }

    #[test]
    fn regex_coerces_non_strings() {
        let rule = make_rule(RuleType::Regex, Some("year"), json!({"pattern": r"^\d{4}$"}));
        assert!(evaluate_row(&[rule], &row(&[("year", json!(2026))]), &ctx()).is_empty());
    }

    #[test]
    fn regex_flag_i() {
        let rule = make_rule(
            RuleType::Regex,
            Some("state"),
            json!({"pattern": "^ma$", "flags": "i"}),
        );
        assert!(evaluate_row(&[rule], &row(&[("state", json!("MA"))]), &ctx()).is_empty());
    }

    // -- enum ---------------------------------------------------------------

    #[test]
    fn enum_membership() {
        let rule = make_rule(
            RuleType::Enum,
            Some("class"),
            json!({"values": ["residential", "commercial"]}),
        );
        assert!(evaluate_row(
            std::slice::from_ref(&rule),
            &row(&[("class", json!("residential"))]),
            &ctx()
        )
        .is_empty());
        assert_eq!(
            evaluate_row(std::slice::from_ref(&rule), &row(&[("class", json!("industrial"))]), &ctx())
                .len(),
            1
        );
    }

    #[test]
    fn enum_numeric_coercion() {
        let rule = make_rule(RuleType::Enum, Some("zone"), json!({"values": [1, 2, 3]}));
        assert!(evaluate_row(&[rule], &row(&[("zone", json!("2"))]), &ctx()).is_empty());
    }

    // -- referential --------------------------------------------------------

    #[test]
    fn referential_uses_cached_set() {
        let rule = make_rule(
            RuleType::Referential,
            Some("district_id"),
            json!({"ref_table": "districts", "ref_field": "id"}),
        );
        let mut context = EvalContext::default();
        context.reference_sets.insert(
            ("districts".to_string(), "id".to_string()),
            ["7".to_string(), "8".to_string()].into_iter().collect(),
        );
        assert!(evaluate_row(std::slice::from_ref(&rule), &row(&[("district_id", json!(7))]), &context)
            .is_empty());
        assert_eq!(
            evaluate_row(std::slice::from_ref(&rule), &row(&[("district_id", json!(99))]), &context)
                .len(),
            1
        );
    }

    // -- custom_expression --------------------------------------------------

    #[test]
    fn expression_rule_is_row_level() {
        let rule = make_rule(
            RuleType::CustomExpression,
            None,
            json!({"expr": "total_value >= land_value"}),
        );
        let ok = row(&[("land_value", json!(10)), ("total_value", json!(20))]);
        let bad = row(&[("land_value", json!(30)), ("total_value", json!(20))]);
        assert!(evaluate_row(std::slice::from_ref(&rule), &ok, &ctx()).is_empty());
        let violations = evaluate_row(std::slice::from_ref(&rule), &bad, &ctx());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].issue_type, "custom_expression");
    }

    // -- arrays -------------------------------------------------------------

    #[test]
    fn array_field_yields_one_violation_per_bad_element() {
        let rule = make_rule(RuleType::Range, Some("bill_years"), json!({"min": 2000}));
        let r = row(&[("bill_years", json!([2024, 1999, 1998]))]);
        assert_eq!(evaluate_row(&[rule], &r, &ctx()).len(), 2);
    }

    // -- severity pass-through ---------------------------------------------

    #[test]
    fn violation_carries_rule_severity() {
        let mut rule = make_rule(RuleType::NotNull, Some("parcel_id"), json!({}));
        rule.severity = Severity::Critical;
        let violations = evaluate_row(&[rule], &row(&[]), &ctx());
        assert_eq!(violations[0].severity, Severity::Critical);
    }
}
