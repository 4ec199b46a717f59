//! Quality rule and violation types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::severity::Severity;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Rule types
// ---------------------------------------------------------------------------

/// The supported rule kinds. `rule_config` is opaque per kind and is
/// validated against the kind's schema at activation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    NotNull,
    Range,
    Regex,
    Enum,
    Referential,
    CustomExpression,
    StatisticalOutlier,
}

impl RuleType {
    /// String representation for display and database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotNull => "not_null",
            Self::Range => "range",
            Self::Regex => "regex",
            Self::Enum => "enum",
            Self::Referential => "referential",
            Self::CustomExpression => "custom_expression",
            Self::StatisticalOutlier => "statistical_outlier",
        }
    }

    /// Which dashboard sub-score this rule kind feeds.
    ///
    /// Completeness counts required fields, accuracy counts value-shape
    /// rules, consistency counts referential and cross-field rules.
    /// Statistical outliers feed issue counts but no sub-score.
    pub fn dimension(self) -> Option<Dimension> {
        match self {
            Self::NotNull => Some(Dimension::Completeness),
            Self::Range | Self::Regex | Self::Enum => Some(Dimension::Accuracy),
            Self::Referential | Self::CustomExpression => Some(Dimension::Consistency),
            Self::StatisticalOutlier => None,
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_null" => Ok(Self::NotNull),
            "range" => Ok(Self::Range),
            "regex" => Ok(Self::Regex),
            "enum" => Ok(Self::Enum),
            "referential" => Ok(Self::Referential),
            "custom_expression" => Ok(Self::CustomExpression),
            "statistical_outlier" => Ok(Self::StatisticalOutlier),
            other => Err(format!("Unknown rule type: {other}")),
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality sub-score dimensions surfaced on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Completeness,
    Accuracy,
    Consistency,
}

// ---------------------------------------------------------------------------
// Rule and violation
// ---------------------------------------------------------------------------

/// A quality rule loaded from the database. `field = None` means the rule
/// evaluates at row level (custom expressions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityRule {
    pub id: DbId,
    pub table: String,
    pub field: Option<String>,
    pub rule_type: RuleType,
    pub config: Value,
    pub severity: Severity,
}

/// A single failed rule evaluation against one record/field.
#[derive(Debug, Clone, Serialize)]
pub struct RuleViolation {
    /// The violated rule, when one exists (engine-detected issues such as
    /// constraint violations carry no rule).
    pub rule_id: Option<DbId>,
    pub field: Option<String>,
    pub issue_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_value: Option<Value>,
    pub severity: Severity,
}

// ---------------------------------------------------------------------------
// Activation-time config validation
// ---------------------------------------------------------------------------

/// Validate `rule_config` against the schema for `rule_type`.
///
/// Rules with invalid configs must never be activated; a rule that slips
/// through anyway is skipped at evaluation time.
pub fn validate_config(rule_type: RuleType, config: &Value) -> Result<(), CoreError> {
    let invalid = |msg: String| Err(CoreError::ConfigInvalid(msg));
    match rule_type {
        RuleType::NotNull => Ok(()),
        RuleType::Range => {
            let min = config.get("min");
            let max = config.get("max");
            if min.is_none() && max.is_none() {
                return invalid("range rule needs min and/or max".to_string());
            }
            for bound in [min, max].into_iter().flatten() {
                if !bound.is_number() {
                    return invalid(format!("range bound must be numeric, got {bound}"));
                }
            }
            Ok(())
        }
        RuleType::Regex => {
            let Some(pattern) = config.get("pattern").and_then(Value::as_str) else {
                return invalid("regex rule needs a string pattern".to_string());
            };
            regex::Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| CoreError::ConfigInvalid(format!("invalid regex: {e}")))
        }
        RuleType::Enum => match config.get("values").and_then(Value::as_array) {
            Some(values) if !values.is_empty() => Ok(()),
            _ => invalid("enum rule needs a non-empty values array".to_string()),
        },
        RuleType::Referential => {
            for key in ["ref_table", "ref_field"] {
                if config.get(key).and_then(Value::as_str).is_none() {
                    return invalid(format!("referential rule needs string {key}"));
                }
            }
            Ok(())
        }
        RuleType::CustomExpression => {
            let Some(expr) = config.get("expr").and_then(Value::as_str) else {
                return invalid("custom_expression rule needs a string expr".to_string());
            };
            super::expr::Expr::parse(expr)
                .map(|_| ())
                .map_err(|e| CoreError::ConfigInvalid(format!("invalid expression: {e}")))
        }
        RuleType::StatisticalOutlier => {
            match config.get("method").and_then(Value::as_str) {
                Some("zscore") | Some("iqr") => {}
                other => {
                    return invalid(format!(
                        "statistical_outlier method must be zscore or iqr, got {other:?}"
                    ))
                }
            }
            match config.get("threshold").and_then(Value::as_f64) {
                Some(t) if t > 0.0 => Ok(()),
                _ => invalid("statistical_outlier needs a positive threshold".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_type_roundtrip() {
        for t in [
            RuleType::NotNull,
            RuleType::Range,
            RuleType::Regex,
            RuleType::Enum,
            RuleType::Referential,
            RuleType::CustomExpression,
            RuleType::StatisticalOutlier,
        ] {
            assert_eq!(t.as_str().parse::<RuleType>().unwrap(), t);
        }
    }

    #[test]
    fn range_config_needs_a_numeric_bound() {
        assert!(validate_config(RuleType::Range, &json!({})).is_err());
        assert!(validate_config(RuleType::Range, &json!({"min": "low"})).is_err());
        assert!(validate_config(RuleType::Range, &json!({"min": 0})).is_ok());
        assert!(validate_config(RuleType::Range, &json!({"min": 0, "max": 10})).is_ok());
    }

    #[test]
    fn regex_config_must_compile() {
        assert!(validate_config(RuleType::Regex, &json!({"pattern": "^[a-z]+$"})).is_ok());
        assert!(validate_config(RuleType::Regex, &json!({"pattern": "["})).is_err());
        assert!(validate_config(RuleType::Regex, &json!({})).is_err());
    }

    #[test]
    fn enum_config_needs_values() {
        assert!(validate_config(RuleType::Enum, &json!({"values": ["a"]})).is_ok());
        assert!(validate_config(RuleType::Enum, &json!({"values": []})).is_err());
    }

    #[test]
    fn referential_config_needs_table_and_field() {
        assert!(validate_config(
            RuleType::Referential,
            &json!({"ref_table": "parcels", "ref_field": "parcel_id"})
        )
        .is_ok());
        assert!(validate_config(RuleType::Referential, &json!({"ref_table": "parcels"})).is_err());
    }

    #[test]
    fn expression_config_must_parse() {
        assert!(validate_config(
            RuleType::CustomExpression,
            &json!({"expr": "land_value >= 0 and total_value >= land_value"})
        )
        .is_ok());
        assert!(
            validate_config(RuleType::CustomExpression, &json!({"expr": "and and"})).is_err()
        );
    }

    #[test]
    fn outlier_config_validates_method_and_threshold() {
        assert!(validate_config(
            RuleType::StatisticalOutlier,
            &json!({"method": "zscore", "threshold": 3.0})
        )
        .is_ok());
        assert!(validate_config(
            RuleType::StatisticalOutlier,
            &json!({"method": "mad", "threshold": 3.0})
        )
        .is_err());
        assert!(validate_config(
            RuleType::StatisticalOutlier,
            &json!({"method": "iqr", "threshold": 0.0})
        )
        .is_err());
    }

    #[test]
    fn dimensions_classify_rule_kinds() {
        assert_eq!(RuleType::NotNull.dimension(), Some(Dimension::Completeness));
        assert_eq!(RuleType::Regex.dimension(), Some(Dimension::Accuracy));
        assert_eq!(RuleType::Referential.dimension(), Some(Dimension::Consistency));
        assert_eq!(RuleType::StatisticalOutlier.dimension(), None);
    }
}
