//! Repository for `sync.table_configs` and `sync.field_configs`.

use sqlx::PgPool;

use crate::models::table_config::{FieldConfig, TableConfig};

/// Column list for `sync.table_configs` queries.
const TABLE_COLUMNS: &str = "\
    id, table_name, sync_order, direction, primary_key_columns, \
    watermark_column, tombstone_column, sanitize, is_active, created_at, updated_at";

/// Column list for `sync.field_configs` queries.
const FIELD_COLUMNS: &str =
    "id, table_name, field_name, declared_type, nullable, is_primary_key";

/// Provides read access to the sync table/field configuration.
pub struct TableConfigRepo;

impl TableConfigRepo {
    /// Active table configurations in declared processing order.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<TableConfig>, sqlx::Error> {
        let query = format!(
            "SELECT {TABLE_COLUMNS} FROM sync.table_configs \
             WHERE is_active ORDER BY sync_order ASC"
        );
        sqlx::query_as::<_, TableConfig>(&query).fetch_all(pool).await
    }

    /// Find one table configuration by name.
    pub async fn find_by_name(
        pool: &PgPool,
        table_name: &str,
    ) -> Result<Option<TableConfig>, sqlx::Error> {
        let query =
            format!("SELECT {TABLE_COLUMNS} FROM sync.table_configs WHERE table_name = $1");
        sqlx::query_as::<_, TableConfig>(&query)
            .bind(table_name)
            .fetch_optional(pool)
            .await
    }

    /// Field configurations for one table, primary-key columns first then
    /// by name, so generated column lists are deterministic.
    pub async fn fields_for_table(
        pool: &PgPool,
        table_name: &str,
    ) -> Result<Vec<FieldConfig>, sqlx::Error> {
        let query = format!(
            "SELECT {FIELD_COLUMNS} FROM sync.field_configs \
             WHERE table_name = $1 \
             ORDER BY is_primary_key DESC, field_name ASC"
        );
        sqlx::query_as::<_, FieldConfig>(&query)
            .bind(table_name)
            .fetch_all(pool)
            .await
    }
}
