//! Data anomaly rows, produced only by `statistical_outlier` rules.

use parcelsync_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `quality.anomalies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DataAnomaly {
    pub id: DbId,
    pub table_name: String,
    pub field_name: String,
    pub record_id: String,
    /// `zscore` or `iqr`.
    pub anomaly_type: String,
    /// Z-score or IQR fence distance, depending on `anomaly_type`.
    pub score: f64,
    pub status: String,
    pub detected_at: Timestamp,
}

/// An anomaly pending insertion.
#[derive(Debug, Clone)]
pub struct NewAnomaly {
    pub table_name: String,
    pub field_name: String,
    pub record_id: String,
    pub anomaly_type: String,
    pub score: f64,
}
