//! End-to-end execution of a sync job across all eligible tables.
//!
//! Policy summary: skip-bad-row (a single row never halts a job), batch
//! retry with exponential backoff for transient endpoint errors, watermark
//! advance only after a batch's writes are acknowledged, cooperative
//! cancel between batches and pause between tables, and table abort on a
//! critical validation issue during up-sync.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parcelsync_core::diff::{FieldSpec, RowChange};
use parcelsync_core::jobs::{Direction, JobType};
use parcelsync_core::quality::{evaluate_row, EvalContext, RuleViolation};
use parcelsync_core::sanitize::{FieldRule, Sanitizer};
use parcelsync_core::severity::{LogLevel, Severity};
use parcelsync_core::types::DbId;
use parcelsync_db::models::issue::NewIssue;
use parcelsync_db::models::job::{JobTotals, SyncJob};
use parcelsync_db::models::table_config::TableConfig;
use parcelsync_db::repositories::{
    AuditRepo, IssueRepo, JobRepo, QualityRuleRepo, SanitizationRuleRepo, TableConfigRepo,
};
use parcelsync_db::DbPool;
use serde_json::Value;
use sqlx::Acquire;

use crate::config::EngineConfig;
use crate::detector::{ChangeDetector, RowDefect, SourceBatch};
use crate::error::{error_kind, is_constraint_violation, is_transient, EngineError};
use crate::export;
use crate::lock::JobLockRegistry;
use crate::logger::JobLogger;
use crate::retry::backoff_delay;
use crate::store::RowStore;

/// How often a paused job polls for resume/cancel.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// How one table's run ended.
enum TableOutcome {
    Completed,
    /// A critical validation issue during up-sync aborted this table.
    CriticalAbort,
    /// A cancel request was observed mid-table.
    Cancelled,
}

/// A job-fatal failure: transport errors that exhausted their retries,
/// timeouts, and engine-level misconfiguration.
pub(crate) struct JobFailure {
    pub(crate) kind: &'static str,
    pub(crate) message: String,
}

impl JobFailure {
    pub(crate) fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(error_kind::CONFIG_INVALID, message)
    }
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// Executes sync jobs. Shared across the dispatcher's worker tasks.
pub struct SyncEngine {
    app: DbPool,
    production: DbPool,
    training: DbPool,
    config: EngineConfig,
    locks: Arc<JobLockRegistry>,
    detector: ChangeDetector,
}

impl SyncEngine {
    pub fn new(
        app: DbPool,
        production: DbPool,
        training: DbPool,
        config: EngineConfig,
        locks: Arc<JobLockRegistry>,
    ) -> Self {
        Self {
            app,
            production,
            training,
            config,
            locks,
            detector: ChangeDetector::default(),
        }
    }

    /// Source and target pools for a direction.
    fn endpoints(&self, direction: Direction) -> (&DbPool, &DbPool) {
        match direction {
            Direction::Down => (&self.production, &self.training),
            Direction::Up => (&self.training, &self.production),
        }
    }

    /// Execute one claimed job to a terminal state.
    ///
    /// This function never returns an error: every failure path is
    /// recorded on the job row instead.
    pub async fn execute(&self, job: SyncJob) {
        let job_id = job.id;
        let (logger, log_handle) = JobLogger::start(self.app.clone(), job_id);

        let job_type: JobType = match job.job_type.parse() {
            Ok(t) => t,
            Err(e) => {
                logger.error(None, None, format!("Rejected job: {e}"));
                self.finish_failed(job_id, error_kind::CONFIG_INVALID, &e).await;
                drop(logger);
                let _ = log_handle.await;
                return;
            }
        };

        let Some(_lock) = self.locks.try_acquire(job_type) else {
            logger.warning(None, "Logical lock held; job refused");
            self.finish_failed(
                job_id,
                error_kind::ALREADY_RUNNING,
                &format!("A {job_type} job is already running"),
            )
            .await;
            drop(logger);
            let _ = log_handle.await;
            return;
        };

        logger.info(None, format!("Job started ({job_type})"));

        let run = tokio::time::timeout(
            self.config.job_timeout,
            self.run_job(&job, job_type, &logger),
        )
        .await;

        match run {
            Err(_) => {
                logger.error(None, None, "Job deadline exceeded");
                self.finish_failed(job_id, error_kind::TIMEOUT_EXCEEDED, "Job deadline exceeded")
                    .await;
            }
            Ok(Err(failure)) => {
                logger.error(None, None, format!("{}: {}", failure.kind, failure.message));
                self.finish_failed(job_id, failure.kind, &failure.message).await;
            }
            Ok(Ok(verdict)) => match verdict {
                JobVerdict::Cancelled => {
                    logger.info(None, "Job cancelled by user");
                    if let Err(e) = JobRepo::mark_cancelled(&self.app, job_id).await {
                        tracing::error!(job_id, error = %e, "Failed to record cancellation");
                    }
                }
                JobVerdict::FailedOnCritical => {
                    logger.error(None, None, "One or more tables aborted on critical issues");
                    self.finish_failed(
                        job_id,
                        error_kind::CRITICAL_VALIDATION,
                        "One or more tables aborted on critical validation issues",
                    )
                    .await;
                }
                JobVerdict::Succeeded => {
                    logger.info(None, "Job completed");
                    if let Err(e) = JobRepo::complete(&self.app, job_id).await {
                        tracing::error!(job_id, error = %e, "Failed to record completion");
                    }
                }
            },
        }

        drop(logger);
        let _ = log_handle.await;
    }

    async fn finish_failed(&self, job_id: DbId, kind: &str, message: &str) {
        if let Err(e) = JobRepo::fail(&self.app, job_id, kind, message).await {
            tracing::error!(job_id, error = %e, "Failed to record job failure");
        }
    }

    /// Run the job body: exports divert, syncs iterate tables in order.
    async fn run_job(
        &self,
        job: &SyncJob,
        job_type: JobType,
        logger: &JobLogger,
    ) -> Result<JobVerdict, JobFailure> {
        if job_type == JobType::PropertyExport {
            return export::run_export(self, job, logger).await;
        }

        let direction = job_type.direction();
        let tables = TableConfigRepo::list_active(&self.app)
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
        let eligible: Vec<TableConfig> = tables
            .into_iter()
            .filter(|t| t.allows(direction))
            .collect();

        logger.info(None, format!("Processing {} tables", eligible.len()));

        let mut any_critical = false;
        for table in &eligible {
            match self.check_control(job.id).await? {
                Control::Continue => {}
                Control::Cancel => return Ok(JobVerdict::Cancelled),
                Control::Pause => {
                    if !self.wait_while_paused(job.id, logger).await? {
                        return Ok(JobVerdict::Cancelled);
                    }
                }
            }

            match self.run_table(job, job_type, table, logger).await? {
                TableOutcome::Completed => {}
                TableOutcome::CriticalAbort => any_critical = true,
                TableOutcome::Cancelled => return Ok(JobVerdict::Cancelled),
            }
        }

        if any_critical {
            Ok(JobVerdict::FailedOnCritical)
        } else {
            Ok(JobVerdict::Succeeded)
        }
    }

    // -----------------------------------------------------------------------
    // Per-table execution
    // -----------------------------------------------------------------------

    async fn run_table(
        &self,
        job: &SyncJob,
        job_type: JobType,
        table: &TableConfig,
        logger: &JobLogger,
    ) -> Result<TableOutcome, JobFailure> {
        let table_name = table.table_name.as_str();
        let (source, target) = self.endpoints(job_type.direction());

        let fields: Vec<FieldSpec> = TableConfigRepo::fields_for_table(&self.app, table_name)
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?
            .iter()
            .map(|f| f.to_spec())
            .collect();
        if fields.is_empty() {
            logger.warning(Some(table_name), "No field configuration; table skipped");
            return Ok(TableOutcome::Completed);
        }
        let pk_columns = table.primary_key_columns.clone();
        if pk_columns.is_empty() {
            logger.warning(Some(table_name), "No primary key configured; table skipped");
            return Ok(TableOutcome::Completed);
        }

        // Watermark lower bound for incremental pulls.
        let watermark_column = if job_type.uses_watermark() {
            table.watermark_column.as_deref()
        } else {
            None
        };
        let watermark = match watermark_column {
            Some(_) => JobRepo::last_watermark(
                &self.app,
                table_name,
                &[job.job_type.clone()],
            )
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?,
            None => None,
        };

        // Sanitization rules (down-sync only, per-table opt-in).
        let sanitizer_rules = if job_type.sanitizes() && table.sanitize {
            self.load_sanitizer_rules(table_name, &fields).await?
        } else {
            BTreeMap::new()
        };
        let sanitizer = Sanitizer::new(self.config.sanitize_key.as_bytes());

        // Quality rules and their referential caches.
        let rules: Vec<_> = QualityRuleRepo::list_active_for_table(&self.app, table_name)
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?
            .iter()
            .filter_map(|r| r.to_core())
            .collect();
        let eval_ctx = self.build_eval_context(source, &rules).await;

        logger.info(
            Some(table_name),
            format!(
                "Table started (watermark: {}, rules: {}, sanitized fields: {})",
                watermark
                    .as_ref()
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                rules.len(),
                sanitizer_rules.len(),
            ),
        );

        let mut totals = JobTotals {
            tables_processed: 1,
            ..JobTotals::default()
        };
        let mut source_keys: HashSet<String> = HashSet::new();
        let mut offset = 0i64;
        let mut outcome = TableOutcome::Completed;

        loop {
            if matches!(self.check_control(job.id).await?, Control::Cancel) {
                outcome = TableOutcome::Cancelled;
                break;
            }

            let batch_result = tokio::time::timeout(
                self.config.batch_timeout,
                self.run_batch(
                    job,
                    job_type,
                    table,
                    &fields,
                    &pk_columns,
                    watermark_column,
                    watermark.as_ref(),
                    offset,
                    &sanitizer,
                    &sanitizer_rules,
                    &rules,
                    &eval_ctx,
                    &mut totals,
                    &mut source_keys,
                    logger,
                ),
            )
            .await
            .map_err(|_| {
                JobFailure::new(error_kind::TIMEOUT_EXCEEDED, "Batch deadline exceeded")
            })?;

            match batch_result? {
                BatchOutcome::Continue { pulled } => {
                    offset += pulled;
                    if pulled < self.config.batch_size {
                        break;
                    }
                }
                BatchOutcome::CriticalAbort => {
                    outcome = TableOutcome::CriticalAbort;
                    break;
                }
            }
        }

        // Full syncs converge deletions after the last batch.
        if matches!(outcome, TableOutcome::Completed) && job_type.deletes_missing_rows() {
            let missing = self
                .detector
                .missing_in_source(
                    target,
                    table_name,
                    &pk_columns,
                    table.tombstone_column.as_deref(),
                    &source_keys,
                )
                .await
                .map_err(|e| JobFailure::new(error_kind::TARGET_UNAVAILABLE, e.to_string()))?;
            if !missing.is_empty() {
                let deleted = RowStore::soft_delete(
                    target,
                    table_name,
                    &pk_columns,
                    &missing,
                    table.tombstone_column.as_deref(),
                )
                .await
                .map_err(|e| JobFailure::new(error_kind::TARGET_UNAVAILABLE, e.to_string()))?;
                logger.info(
                    Some(table_name),
                    format!("Soft-deleted {deleted} rows absent from source"),
                );
            }
        }

        JobRepo::add_totals(&self.app, job.id, &totals)
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
        logger.info(
            Some(table_name),
            format!(
                "Table finished (read: {}, written: {}, skipped: {}, issues: {})",
                totals.rows_read, totals.rows_written, totals.rows_skipped, totals.issues
            ),
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Per-batch execution
    // -----------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn run_batch(
        &self,
        job: &SyncJob,
        job_type: JobType,
        table: &TableConfig,
        fields: &[FieldSpec],
        pk_columns: &[String],
        watermark_column: Option<&str>,
        watermark: Option<&Value>,
        offset: i64,
        sanitizer: &Sanitizer,
        sanitizer_rules: &BTreeMap<String, FieldRule>,
        rules: &[parcelsync_core::quality::QualityRule],
        eval_ctx: &EvalContext,
        totals: &mut JobTotals,
        source_keys: &mut HashSet<String>,
        logger: &JobLogger,
    ) -> Result<BatchOutcome, JobFailure> {
        let table_name = table.table_name.as_str();
        let (source, target) = self.endpoints(job_type.direction());

        // Pull, with batch-level retry for transient source errors.
        let mut batch = self
            .with_retry(error_kind::SOURCE_UNAVAILABLE, || {
                self.detector.pull_source_batch(
                    source,
                    table_name,
                    fields,
                    pk_columns,
                    watermark_column,
                    watermark,
                    self.config.batch_size,
                    offset,
                )
            })
            .await?;

        let pulled = (batch.rows.len() + batch.defects.len()) as i64;
        totals.rows_read += pulled;
        if pulled == 0 {
            return Ok(BatchOutcome::Continue { pulled });
        }

        self.record_defects(job.id, table_name, &batch, totals, logger).await;

        // Sanitize (down-sync only; rules empty otherwise). Audit entries
        // are held back until planning: only fields that actually reach
        // the target get audited, so an unchanged masked field on an
        // UPDATE leaves no trail.
        let mut pending_audit: std::collections::HashMap<
            String,
            Vec<parcelsync_core::sanitize::AuditEntry>,
        > = std::collections::HashMap::new();
        if !sanitizer_rules.is_empty() {
            for keyed in &mut batch.rows {
                let audit = sanitizer.sanitize_row(sanitizer_rules, &mut keyed.row, &keyed.key);
                if !audit.is_empty() {
                    pending_audit.insert(keyed.key.clone(), audit);
                }
            }
        }

        // Validate. A critical violation aborts the table on up-sync.
        let mut issues: Vec<NewIssue> = Vec::new();
        let mut critical_hit = false;
        for keyed in &batch.rows {
            let violations = evaluate_row(rules, &keyed.row, eval_ctx);
            if job_type.direction() == Direction::Up
                && violations.iter().any(|v| v.severity == Severity::Critical)
            {
                critical_hit = true;
            }
            for violation in violations {
                issues.push(to_issue(job.id, table_name, &keyed.key, violation));
            }
        }
        if !issues.is_empty() {
            let created = IssueRepo::insert_batch(&self.app, &issues)
                .await
                .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
            totals.issues += created as i64;
        }
        if critical_hit {
            logger.log(
                LogLevel::Error,
                Some(table_name),
                None,
                "aborted_on_critical: critical validation issue during up-sync",
            );
            // Rows pulled in this batch were not written.
            totals.rows_skipped += batch.rows.len() as i64;
            return Ok(BatchOutcome::CriticalAbort);
        }

        for keyed in &batch.rows {
            source_keys.insert(keyed.key.clone());
        }

        // Plan against the target, with batch-level retry.
        let changes = self
            .with_retry(error_kind::TARGET_UNAVAILABLE, || {
                self.detector
                    .plan_batch(target, table_name, fields, pk_columns, &batch.rows)
            })
            .await?;

        // Persist the audit trail for fields that will actually be written.
        for change in &changes {
            let Some(audit) = pending_audit.remove(change.key()) else {
                continue;
            };
            let kept: Vec<_> = match change {
                RowChange::Insert { .. } => audit,
                RowChange::Update { fields: changed, .. } => audit
                    .into_iter()
                    .filter(|entry| changed.contains_key(&entry.field))
                    .collect(),
                RowChange::Skip { .. } => Vec::new(),
            };
            if kept.is_empty() {
                continue;
            }
            totals.sanitized_fields += kept.len() as i64;
            if let Err(e) =
                AuditRepo::insert_entries(&self.app, job.id, table_name, change.key(), &kept).await
            {
                tracing::error!(table = table_name, error = %e, "Failed to write audit trail");
            }
        }

        // Apply writes, retrying the whole batch on transient failure.
        let mut attempt = 0u32;
        let applied = loop {
            match self
                .apply_changes(target, table_name, fields, pk_columns, &changes, job.id, logger)
                .await
            {
                Ok(applied) => break applied,
                Err(e) if is_transient(&e) && attempt + 1 < self.config.max_write_attempts => {
                    attempt += 1;
                    let delay = backoff_delay(self.config.retry_base, attempt);
                    logger.warning(
                        Some(table_name),
                        format!("Transient write failure (attempt {attempt}): {e}; retrying"),
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(JobFailure::new(error_kind::TARGET_UNAVAILABLE, e.to_string()))
                }
            }
        };
        totals.rows_written += applied.written;
        totals.rows_skipped += applied.skipped;
        totals.issues += applied.issues;

        // The batch's writes are acknowledged. Advance the watermark to
        // the maximum over converged rows only — a failed row holds it
        // back so the next incremental run sees that row again.
        if let Some(wm_col) = watermark_column {
            let failed: HashSet<&str> =
                applied.failed_keys.iter().map(String::as_str).collect();
            let mut advanced: Option<Value> = None;
            for keyed in &batch.rows {
                if failed.contains(keyed.key.as_str()) {
                    continue;
                }
                let Some(value) = keyed.row.get(wm_col) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                advanced = Some(match advanced.take() {
                    Some(current) => crate::detector::max_watermark(current, value.clone()),
                    None => value.clone(),
                });
            }
            if let Some(max_watermark) = advanced {
                JobRepo::set_watermark(&self.app, job.id, table_name, &max_watermark)
                    .await
                    .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
            }
        }

        Ok(BatchOutcome::Continue { pulled })
    }

    /// Apply planned changes inside one transaction, isolating per-row
    /// constraint errors with savepoints so rows 1..N-1 survive a failure
    /// at row N.
    async fn apply_changes(
        &self,
        target: &DbPool,
        table_name: &str,
        fields: &[FieldSpec],
        pk_columns: &[String],
        changes: &[RowChange],
        job_id: DbId,
        logger: &JobLogger,
    ) -> Result<AppliedCounts, sqlx::Error> {
        let columns: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let mut counts = AppliedCounts::default();
        let mut tx = target.begin().await?;

        for change in changes {
            match change {
                RowChange::Skip { .. } => {
                    counts.skipped += 1;
                }
                RowChange::Insert { key, row } => {
                    let mut sp = tx.begin().await?;
                    match RowStore::insert_row(&mut *sp, table_name, &columns, row).await {
                        Ok(()) => {
                            sp.commit().await?;
                            counts.written += 1;
                        }
                        Err(e) => {
                            sp.rollback().await?;
                            self.handle_row_error(table_name, key, e, job_id, &mut counts, logger)
                                .await?;
                        }
                    }
                }
                RowChange::Update { key, fields: changed } => {
                    let changed_columns: Vec<String> = changed
                        .keys()
                        .filter(|c| !pk_columns.contains(*c))
                        .cloned()
                        .collect();
                    let mut sp = tx.begin().await?;
                    match RowStore::update_row(
                        &mut *sp,
                        table_name,
                        &changed_columns,
                        pk_columns,
                        changed,
                    )
                    .await
                    {
                        Ok(_) => {
                            sp.commit().await?;
                            counts.written += 1;
                        }
                        Err(e) => {
                            sp.rollback().await?;
                            self.handle_row_error(table_name, key, e, job_id, &mut counts, logger)
                                .await?;
                        }
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(counts)
    }

    /// Per-row write error disposition: constraint violations (and other
    /// row-scoped rejections) skip the row with a log and an open issue;
    /// transient errors bubble up so the batch retries.
    async fn handle_row_error(
        &self,
        table_name: &str,
        key: &str,
        error: EngineError,
        job_id: DbId,
        counts: &mut AppliedCounts,
        logger: &JobLogger,
    ) -> Result<(), sqlx::Error> {
        let db_error = match error {
            EngineError::Database(e) => e,
            other => {
                // Identifier/config problems are row-independent but are
                // still surfaced per row; skip and continue.
                logger.error(Some(table_name), Some(key), other.to_string());
                counts.skipped += 1;
                counts.failed_keys.push(key.to_string());
                return Ok(());
            }
        };

        if is_transient(&db_error) {
            return Err(db_error);
        }

        let kind = if is_constraint_violation(&db_error) {
            error_kind::CONSTRAINT_VIOLATION
        } else {
            error_kind::TYPE_MISMATCH
        };
        logger.error(
            Some(table_name),
            Some(key),
            format!("{kind}: {db_error}"),
        );
        let issue = NewIssue {
            rule_id: None,
            job_id: Some(job_id),
            table_name: table_name.to_string(),
            field_name: None,
            record_id: key.to_string(),
            issue_type: kind.to_string(),
            issue_value: None,
            severity: Severity::Error,
        };
        match IssueRepo::insert_open(&self.app, &issue).await {
            Ok(Some(_)) => counts.issues += 1,
            Ok(None) => {}
            Err(e) => tracing::error!(table = table_name, error = %e, "Failed to record issue"),
        }
        counts.skipped += 1;
        counts.failed_keys.push(key.to_string());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    async fn record_defects(
        &self,
        job_id: DbId,
        table_name: &str,
        batch: &SourceBatch,
        totals: &mut JobTotals,
        logger: &JobLogger,
    ) {
        for (record, defect) in &batch.defects {
            let (issue_type, message) = match defect {
                RowDefect::InvalidKey(e) => ("invalid_key", e.to_string()),
                RowDefect::TypeMismatch { column } => (
                    error_kind::TYPE_MISMATCH,
                    format!("Handler could not extract column {column}"),
                ),
            };
            logger.error(Some(table_name), record.as_deref(), message);
            let issue = NewIssue {
                rule_id: None,
                job_id: Some(job_id),
                table_name: table_name.to_string(),
                field_name: None,
                record_id: record.clone().unwrap_or_else(|| "unknown".to_string()),
                issue_type: issue_type.to_string(),
                issue_value: None,
                severity: Severity::Error,
            };
            match IssueRepo::insert_open(&self.app, &issue).await {
                Ok(Some(_)) => totals.issues += 1,
                Ok(None) => {}
                Err(e) => tracing::error!(table = table_name, error = %e, "Failed to record issue"),
            }
            totals.rows_skipped += 1;
        }
    }

    async fn load_sanitizer_rules(
        &self,
        table_name: &str,
        fields: &[FieldSpec],
    ) -> Result<BTreeMap<String, FieldRule>, JobFailure> {
        let rows = SanitizationRuleRepo::list_active_for_table(&self.app, table_name)
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
        let mut rules = BTreeMap::new();
        for row in rows {
            let strategy = match row.strategy.parse() {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(rule_id = row.id, error = %e, "Skipping sanitization rule");
                    continue;
                }
            };
            let nullable = fields
                .iter()
                .find(|f| f.name == row.field_name)
                .map(|f| f.nullable)
                .unwrap_or(true);
            rules.insert(row.field_name, FieldRule { strategy, nullable });
        }
        Ok(rules)
    }

    /// Cached referential reference sets for the table's rules.
    async fn build_eval_context(
        &self,
        source: &DbPool,
        rules: &[parcelsync_core::quality::QualityRule],
    ) -> EvalContext {
        let mut ctx = EvalContext::default();
        for rule in rules {
            if rule.rule_type != parcelsync_core::quality::RuleType::Referential {
                continue;
            }
            let Some(ref_table) = rule.config.get("ref_table").and_then(Value::as_str) else {
                continue;
            };
            let Some(ref_field) = rule.config.get("ref_field").and_then(Value::as_str) else {
                continue;
            };
            let cache_key = (ref_table.to_string(), ref_field.to_string());
            if ctx.reference_sets.contains_key(&cache_key) {
                continue;
            }
            match RowStore::reference_set(source, ref_table, ref_field).await {
                Ok(set) => {
                    ctx.reference_sets.insert(cache_key, set);
                }
                Err(e) => {
                    tracing::warn!(
                        ref_table,
                        ref_field,
                        error = %e,
                        "Reference set unavailable; referential rule will skip"
                    );
                }
            }
        }
        ctx
    }

    /// Batch-level retry with exponential backoff for transient errors.
    async fn with_retry<T, F, Fut>(
        &self,
        failure_kind: &'static str,
        mut operation: F,
    ) -> Result<T, JobFailure>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, EngineError>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(EngineError::Database(e))
                    if is_transient(&e) && attempt + 1 < self.config.max_write_attempts =>
                {
                    attempt += 1;
                    let delay = backoff_delay(self.config.retry_base, attempt);
                    tracing::warn!(attempt, error = %e, "Transient endpoint error; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(JobFailure::new(failure_kind, e.to_string())),
            }
        }
    }

    /// Read the job's cooperative control flags.
    async fn check_control(&self, job_id: DbId) -> Result<Control, JobFailure> {
        let job = JobRepo::find_by_id(&self.app, job_id)
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
        let Some(job) = job else {
            return Err(JobFailure::new(error_kind::CONFIG_INVALID, "Job row vanished"));
        };
        if job.cancel_requested {
            return Ok(Control::Cancel);
        }
        if job.pause_requested {
            return Ok(Control::Pause);
        }
        Ok(Control::Continue)
    }

    /// Honor a pause request: mark the job paused and poll until it is
    /// resumed or cancelled. Returns `false` when cancelled.
    async fn wait_while_paused(
        &self,
        job_id: DbId,
        logger: &JobLogger,
    ) -> Result<bool, JobFailure> {
        JobRepo::mark_paused(&self.app, job_id)
            .await
            .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
        logger.info(None, "Job paused");

        loop {
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
            let job = JobRepo::find_by_id(&self.app, job_id)
                .await
                .map_err(|e| JobFailure::new(error_kind::CONFIG_INVALID, e.to_string()))?;
            let Some(job) = job else {
                return Err(JobFailure::new(error_kind::CONFIG_INVALID, "Job row vanished"));
            };
            if job.cancel_requested {
                return Ok(false);
            }
            // Resume clears the pause flag and restores Running.
            if !job.pause_requested {
                logger.info(None, "Job resumed");
                return Ok(true);
            }
        }
    }

    /// Application pool accessor for collaborators (export).
    pub(crate) fn app_pool(&self) -> &DbPool {
        &self.app
    }

    /// Production pool accessor for collaborators (export).
    pub(crate) fn production_pool(&self) -> &DbPool {
        &self.production
    }

    pub(crate) fn engine_config(&self) -> &EngineConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Small shared types
// ---------------------------------------------------------------------------

/// Overall verdict of a job run.
pub(crate) enum JobVerdict {
    Succeeded,
    FailedOnCritical,
    Cancelled,
}

enum Control {
    Continue,
    Cancel,
    Pause,
}

enum BatchOutcome {
    Continue { pulled: i64 },
    CriticalAbort,
}

#[derive(Default)]
struct AppliedCounts {
    written: i64,
    skipped: i64,
    issues: i64,
    /// Keys whose write was rejected; these hold the watermark back.
    failed_keys: Vec<String>,
}

fn to_issue(job_id: DbId, table_name: &str, record_id: &str, violation: RuleViolation) -> NewIssue {
    NewIssue {
        rule_id: violation.rule_id,
        job_id: Some(job_id),
        table_name: table_name.to_string(),
        field_name: violation.field,
        record_id: record_id.to_string(),
        issue_type: violation.issue_type,
        issue_value: violation.issue_value,
        severity: violation.severity,
    }
}

