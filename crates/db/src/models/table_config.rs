//! Synced-table and field configuration. The engine reads these as its
//! source of truth for table order, identity, and column lists.

use parcelsync_core::diff::FieldSpec;
use parcelsync_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `sync.table_configs` table.
///
/// `sync_order` is unique and defines the deterministic per-job table
/// processing order.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TableConfig {
    pub id: DbId,
    pub table_name: String,
    pub sync_order: i32,
    /// `up_only`, `down_only`, or `both`.
    pub direction: String,
    pub primary_key_columns: Vec<String>,
    pub watermark_column: Option<String>,
    /// Tombstone column for soft deletes; hard delete when absent.
    pub tombstone_column: Option<String>,
    pub sanitize: bool,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TableConfig {
    /// Whether this table participates in a job of the given direction.
    pub fn allows(&self, direction: parcelsync_core::jobs::Direction) -> bool {
        use parcelsync_core::jobs::Direction;
        match self.direction.as_str() {
            "both" => true,
            "up_only" => direction == Direction::Up,
            "down_only" => direction == Direction::Down,
            _ => false,
        }
    }
}

/// A row from the `sync.field_configs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FieldConfig {
    pub id: DbId,
    pub table_name: String,
    pub field_name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
}

impl FieldConfig {
    /// Core-layer field specification for the diff planner.
    pub fn to_spec(&self) -> FieldSpec {
        FieldSpec {
            name: self.field_name.clone(),
            declared_type: self.declared_type.clone(),
            is_primary_key: self.is_primary_key,
            nullable: self.nullable,
        }
    }
}
