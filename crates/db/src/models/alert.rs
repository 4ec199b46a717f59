//! Data-quality alert rows: predicates over reports/issues that trigger
//! notifications when satisfied.

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `quality.alerts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QualityAlert {
    pub id: DbId,
    pub alert_type: String,
    pub table_name: Option<String>,
    pub field_name: Option<String>,
    pub severity_threshold: String,
    /// Opaque predicate payload; see `parcelsync_core::quality::alert`.
    pub conditions: serde_json::Value,
    pub recipients: Vec<String>,
    /// Subset of `email`, `chat`, `sms`.
    pub channels: Vec<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an alert.
#[derive(Debug, Deserialize)]
pub struct NewAlert {
    pub alert_type: String,
    pub table_name: Option<String>,
    pub field_name: Option<String>,
    pub severity_threshold: String,
    pub conditions: serde_json::Value,
    pub recipients: Vec<String>,
    pub channels: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// DTO for updating an alert.
#[derive(Debug, Deserialize)]
pub struct UpdateAlert {
    pub severity_threshold: Option<String>,
    pub conditions: Option<serde_json::Value>,
    pub recipients: Option<Vec<String>>,
    pub channels: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}
