//! Read-only property export.
//!
//! Bypasses the change detector entirely: configured tables are streamed
//! from production into JSON-lines files under the export directory. The
//! export writes into a temp directory and renames it into place on
//! success; any failure removes the temp directory and fails the job, so
//! a partial export is never visible.

use chrono::{Datelike, Utc};
use parcelsync_core::jobs::Direction;
use parcelsync_db::models::job::{JobTotals, SyncJob};
use parcelsync_db::repositories::{JobRepo, TableConfigRepo};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::detector::ChangeDetector;
use crate::error::error_kind;
use crate::logger::JobLogger;
use crate::sync::{JobFailure, JobVerdict, SyncEngine};

/// Export parameters carried in the job's `parameters` payload.
#[derive(Debug, serde::Deserialize)]
struct ExportParams {
    database_name: String,
    /// Restrict to rows whose watermark falls within the last N years.
    num_years: Option<i32>,
    /// Carried through to the export metadata for the billing consumer.
    min_bill_years: Option<i32>,
}

/// Run a `property_export` job.
pub(crate) async fn run_export(
    engine: &SyncEngine,
    job: &SyncJob,
    logger: &JobLogger,
) -> Result<JobVerdict, JobFailure> {
    let params: ExportParams = serde_json::from_value(job.parameters.clone())
        .map_err(|e| JobFailure::config(format!("Invalid export parameters: {e}")))?;

    let config = engine.engine_config();
    let final_dir = config
        .export_dir
        .join(format!("{}-job{}", params.database_name, job.id));
    let temp_dir = config
        .export_dir
        .join(format!(".{}-job{}.tmp", params.database_name, job.id));

    tokio::fs::create_dir_all(&temp_dir)
        .await
        .map_err(|e| JobFailure::config(format!("Cannot create export directory: {e}")))?;

    let result = write_export(engine, job, &params, &temp_dir, logger).await;

    match result {
        Ok(totals) => {
            tokio::fs::rename(&temp_dir, &final_dir)
                .await
                .map_err(|e| JobFailure::config(format!("Cannot finalize export: {e}")))?;
            JobRepo::add_totals(engine.app_pool(), job.id, &totals)
                .await
                .map_err(|e| JobFailure::config(e.to_string()))?;
            logger.info(
                None,
                format!(
                    "Export finished: {} rows across {} tables -> {}",
                    totals.rows_read,
                    totals.tables_processed,
                    final_dir.display()
                ),
            );
            Ok(JobVerdict::Succeeded)
        }
        Err(failure) => {
            if let Err(e) = tokio::fs::remove_dir_all(&temp_dir).await {
                tracing::warn!(error = %e, "Failed to clean up partial export");
            }
            Err(failure)
        }
    }
}

async fn write_export(
    engine: &SyncEngine,
    job: &SyncJob,
    params: &ExportParams,
    temp_dir: &std::path::Path,
    logger: &JobLogger,
) -> Result<JobTotals, JobFailure> {
    let app = engine.app_pool();
    let production = engine.production_pool();
    let config = engine.engine_config();
    let detector = ChangeDetector::default();

    // Rows newer than this watermark bound are exported; None scans fully.
    let since: Option<Value> = params.num_years.map(|years| {
        let now = Utc::now();
        let bound = now
            .with_year(now.year() - years)
            .unwrap_or(now);
        Value::String(bound.to_rfc3339())
    });

    let tables = TableConfigRepo::list_active(app)
        .await
        .map_err(|e| JobFailure::config(e.to_string()))?;

    let mut totals = JobTotals::default();
    for table in tables.iter().filter(|t| t.allows(Direction::Down)) {
        let fields: Vec<_> = TableConfigRepo::fields_for_table(app, &table.table_name)
            .await
            .map_err(|e| JobFailure::config(e.to_string()))?
            .iter()
            .map(|f| f.to_spec())
            .collect();
        if fields.is_empty() {
            continue;
        }

        let path = temp_dir.join(format!("{}.jsonl", table.table_name.replace('.', "_")));
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| JobFailure::config(format!("Cannot create export file: {e}")))?;

        let watermark_column = since
            .as_ref()
            .and(table.watermark_column.as_deref());
        let mut offset = 0i64;
        let mut table_rows = 0i64;
        loop {
            let batch = detector
                .pull_source_batch(
                    production,
                    &table.table_name,
                    &fields,
                    &table.primary_key_columns,
                    watermark_column,
                    since.as_ref(),
                    config.batch_size,
                    offset,
                )
                .await
                .map_err(|e| {
                    JobFailure::new(error_kind::SOURCE_UNAVAILABLE, e.to_string())
                })?;

            let pulled = (batch.rows.len() + batch.defects.len()) as i64;
            for keyed in &batch.rows {
                let line = Value::Object(keyed.row.clone()).to_string();
                file.write_all(line.as_bytes())
                    .await
                    .map_err(|e| JobFailure::config(format!("Export write failed: {e}")))?;
                file.write_all(b"\n")
                    .await
                    .map_err(|e| JobFailure::config(format!("Export write failed: {e}")))?;
            }
            table_rows += batch.rows.len() as i64;
            offset += pulled;
            if pulled < config.batch_size {
                break;
            }
        }
        file.flush()
            .await
            .map_err(|e| JobFailure::config(format!("Export flush failed: {e}")))?;

        totals.tables_processed += 1;
        totals.rows_read += table_rows;
        logger.info(
            Some(&table.table_name),
            format!("Exported {table_rows} rows"),
        );
    }

    // Metadata for the downstream billing consumer.
    let metadata = serde_json::json!({
        "database_name": params.database_name,
        "num_years": params.num_years,
        "min_bill_years": params.min_bill_years,
        "job_id": job.id,
        "exported_at": Utc::now(),
        "tables": totals.tables_processed,
        "rows": totals.rows_read,
    });
    tokio::fs::write(
        temp_dir.join("metadata.json"),
        serde_json::to_vec_pretty(&metadata).unwrap_or_default(),
    )
    .await
    .map_err(|e| JobFailure::config(format!("Cannot write export metadata: {e}")))?;

    Ok(totals)
}
