//! Data-quality rule rows. `rule_config` must validate against the schema
//! for `rule_type` at activation time.

use parcelsync_core::quality::{QualityRule as CoreRule, RuleType};
use parcelsync_core::severity::Severity;
use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `quality.rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QualityRule {
    pub id: DbId,
    pub table_name: String,
    /// `None` means the rule evaluates at row level.
    pub field_name: Option<String>,
    pub rule_type: String,
    pub rule_config: serde_json::Value,
    pub severity: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl QualityRule {
    /// Core-layer rule for the evaluator. Rows with unparseable type or
    /// severity tags are skipped (and logged) rather than failing the run.
    pub fn to_core(&self) -> Option<CoreRule> {
        let rule_type: RuleType = match self.rule_type.parse() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(rule_id = self.id, error = %e, "Skipping rule");
                return None;
            }
        };
        let severity: Severity = match self.severity.parse() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(rule_id = self.id, error = %e, "Skipping rule");
                return None;
            }
        };
        Some(CoreRule {
            id: self.id,
            table: self.table_name.clone(),
            field: self.field_name.clone(),
            rule_type,
            config: self.rule_config.clone(),
            severity,
        })
    }
}

/// DTO for creating a quality rule.
#[derive(Debug, Deserialize)]
pub struct NewQualityRule {
    pub table_name: String,
    pub field_name: Option<String>,
    pub rule_type: String,
    pub rule_config: serde_json::Value,
    pub severity: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// DTO for updating a quality rule.
#[derive(Debug, Deserialize)]
pub struct UpdateQualityRule {
    pub rule_config: Option<serde_json::Value>,
    pub severity: Option<String>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}
