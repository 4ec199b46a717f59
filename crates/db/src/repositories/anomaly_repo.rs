//! Repository for the `quality.anomalies` table.

use sqlx::PgPool;

use crate::models::anomaly::{DataAnomaly, NewAnomaly};

/// Column list for `quality.anomalies` queries.
const COLUMNS: &str =
    "id, table_name, field_name, record_id, anomaly_type, score, status, detected_at";

/// Default page size for anomaly listing.
const DEFAULT_LIMIT: i64 = 200;

/// Provides insert and read operations for data anomalies.
pub struct AnomalyRepo;

impl AnomalyRepo {
    /// Record one detected anomaly.
    pub async fn insert(pool: &PgPool, anomaly: &NewAnomaly) -> Result<DataAnomaly, sqlx::Error> {
        let query = format!(
            "INSERT INTO quality.anomalies \
                 (table_name, field_name, record_id, anomaly_type, score, status) \
             VALUES ($1, $2, $3, $4, $5, 'open') \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DataAnomaly>(&query)
            .bind(&anomaly.table_name)
            .bind(&anomaly.field_name)
            .bind(&anomaly.record_id)
            .bind(&anomaly.anomaly_type)
            .bind(anomaly.score)
            .fetch_one(pool)
            .await
    }

    /// Most recent anomalies, optionally filtered by table.
    pub async fn list_recent(
        pool: &PgPool,
        table_name: Option<&str>,
    ) -> Result<Vec<DataAnomaly>, sqlx::Error> {
        match table_name {
            Some(t) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM quality.anomalies \
                     WHERE table_name = $1 \
                     ORDER BY detected_at DESC LIMIT {DEFAULT_LIMIT}"
                );
                sqlx::query_as::<_, DataAnomaly>(&query).bind(t).fetch_all(pool).await
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM quality.anomalies \
                     ORDER BY detected_at DESC LIMIT {DEFAULT_LIMIT}"
                );
                sqlx::query_as::<_, DataAnomaly>(&query).fetch_all(pool).await
            }
        }
    }
}
