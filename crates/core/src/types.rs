/// All application-database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A row pulled from (or prepared for) a synced table, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;
