//! Field sanitization rule rows. At most one active rule per
//! (table, field), enforced by a partial unique index.

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `sync.sanitization_rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SanitizationRule {
    pub id: DbId,
    pub table_name: String,
    pub field_name: String,
    pub strategy: String,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a sanitization rule.
#[derive(Debug, Deserialize)]
pub struct NewSanitizationRule {
    pub table_name: String,
    pub field_name: String,
    pub strategy: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_by: Option<String>,
}

/// DTO for updating a sanitization rule.
#[derive(Debug, Deserialize)]
pub struct UpdateSanitizationRule {
    pub strategy: Option<String>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}
