//! Quality report runner.
//!
//! Streams (or samples, past the configured ceiling) each table's rows
//! from production, evaluates the active rules, rolls issues up into
//! severity-weighted scores and the completeness / accuracy / consistency
//! sub-scores, records anomalies from statistical rules, and dispatches
//! matching alerts through the notification router — once per
//! (alert, report) pair.

use std::collections::HashSet;
use std::sync::Arc;

use parcelsync_core::quality::alert::{AlertConditions, ReportSummary};
use parcelsync_core::quality::outlier::{self, OutlierMethod};
use parcelsync_core::quality::rules::Dimension;
use parcelsync_core::quality::score::{overall_score, table_score, DimensionTally};
use parcelsync_core::quality::{evaluate_row, EvalContext, QualityRule, RuleType, SeverityCounts, TableScore};
use parcelsync_core::severity::Severity;
use parcelsync_db::models::anomaly::NewAnomaly;
use parcelsync_db::models::issue::NewIssue;
use parcelsync_db::models::report::{NewReport, QualityReport};
use parcelsync_db::repositories::{
    AlertRepo, AnomalyRepo, IssueRepo, QualityRuleRepo, ReportRepo, TableConfigRepo,
};
use parcelsync_db::DbPool;
use parcelsync_notify::{Notification, NotificationRouter};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::detector::ChangeDetector;
use crate::error::EngineError;
use crate::store::RowStore;

/// Runs quality reports and drives the alerts they trigger.
pub struct ReportRunner {
    app: DbPool,
    production: DbPool,
    config: EngineConfig,
    router: Arc<NotificationRouter>,
}

impl ReportRunner {
    pub fn new(
        app: DbPool,
        production: DbPool,
        config: EngineConfig,
        router: Arc<NotificationRouter>,
    ) -> Self {
        Self {
            app,
            production,
            config,
            router,
        }
    }

    /// Run a report over the given tables (all configured tables when
    /// `None`), persist it, and dispatch matching alerts.
    pub async fn run(
        &self,
        name: Option<String>,
        tables: Option<Vec<String>>,
    ) -> Result<QualityReport, EngineError> {
        let configured = TableConfigRepo::list_active(&self.app).await?;
        let selected: Vec<_> = match &tables {
            Some(wanted) => configured
                .into_iter()
                .filter(|t| wanted.contains(&t.table_name))
                .collect(),
            None => configured,
        };

        let mut table_scores: Vec<TableScore> = Vec::new();
        let mut total_counts = SeverityCounts::default();
        let mut total_anomalies = 0u64;

        for table in &selected {
            let scored = self.check_table(&table.table_name, &table.primary_key_columns).await?;
            total_counts.info += scored.score.counts.info;
            total_counts.warning += scored.score.counts.warning;
            total_counts.error += scored.score.counts.error;
            total_counts.critical += scored.score.counts.critical;
            total_anomalies += scored.anomalies;
            table_scores.push(scored.score);
        }

        let overall = overall_score(&table_scores);
        let tables_checked: Vec<String> =
            table_scores.iter().map(|t| t.table.clone()).collect();

        let report = ReportRepo::insert(
            &self.app,
            &NewReport {
                name: name.unwrap_or_else(|| "scheduled-quality-report".to_string()),
                tables_checked: tables_checked.clone(),
                overall_score: overall,
                counts: total_counts,
                report_data: serde_json::json!({
                    "tables": table_scores,
                    "anomalies": total_anomalies,
                }),
            },
        )
        .await?;

        tracing::info!(
            report_id = report.id,
            overall = ?overall,
            tables = tables_checked.len(),
            "Quality report created"
        );

        let summary = ReportSummary {
            overall_score: overall,
            counts: total_counts,
            anomalies: total_anomalies,
            tables: tables_checked,
        };
        self.dispatch_alerts(&report, &summary).await;

        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Per-table checking
    // -----------------------------------------------------------------------

    async fn check_table(
        &self,
        table_name: &str,
        pk_columns: &[String],
    ) -> Result<CheckedTable, EngineError> {
        let fields: Vec<_> = TableConfigRepo::fields_for_table(&self.app, table_name)
            .await?
            .iter()
            .map(|f| f.to_spec())
            .collect();

        let all_rules: Vec<QualityRule> =
            QualityRuleRepo::list_active_for_table(&self.app, table_name)
                .await?
                .iter()
                .filter_map(|r| r.to_core())
                .collect();
        let (outlier_rules, row_rules): (Vec<_>, Vec<_>) = all_rules
            .into_iter()
            .partition(|r| r.rule_type == RuleType::StatisticalOutlier);

        let ctx = self.build_context(&row_rules).await;

        let total_rows = RowStore::count_rows(&self.production, table_name).await?;
        let row_limit = total_rows.min(self.config.report_sample_ceiling);
        if total_rows > self.config.report_sample_ceiling {
            tracing::info!(
                table = table_name,
                total_rows,
                sampled = row_limit,
                "Table exceeds streaming ceiling; sampling"
            );
        }

        let detector = ChangeDetector::default();
        let mut counts = SeverityCounts::default();
        let mut completeness = DimensionTally::default();
        let mut accuracy = DimensionTally::default();
        let mut consistency = DimensionTally::default();
        let mut rows_checked = 0u64;
        let mut offset = 0i64;

        while offset < row_limit && !fields.is_empty() {
            let batch_size = self.config.batch_size.min(row_limit - offset);
            let batch = detector
                .pull_source_batch(
                    &self.production,
                    table_name,
                    &fields,
                    pk_columns,
                    None,
                    None,
                    batch_size,
                    offset,
                )
                .await?;
            let pulled = (batch.rows.len() + batch.defects.len()) as i64;
            if pulled == 0 {
                break;
            }

            for keyed in &batch.rows {
                rows_checked += 1;
                let violations = evaluate_row(&row_rules, &keyed.row, &ctx);
                let violated_rules: HashSet<Option<i64>> =
                    violations.iter().map(|v| v.rule_id).collect();

                // Dimension tallies: every applicable rule counts as one
                // check per row; failures come from the violation set.
                for rule in &row_rules {
                    let failed = violated_rules.contains(&Some(rule.id));
                    match rule.rule_type.dimension() {
                        Some(Dimension::Completeness) => completeness.record(failed),
                        Some(Dimension::Accuracy) => accuracy.record(failed),
                        Some(Dimension::Consistency) => consistency.record(failed),
                        None => {}
                    }
                }

                for violation in violations {
                    counts.add(violation.severity);
                    let issue = NewIssue {
                        rule_id: violation.rule_id,
                        job_id: None,
                        table_name: table_name.to_string(),
                        field_name: violation.field,
                        record_id: keyed.key.clone(),
                        issue_type: violation.issue_type,
                        issue_value: violation.issue_value,
                        severity: violation.severity,
                    };
                    if let Err(e) = IssueRepo::insert_open(&self.app, &issue).await {
                        tracing::error!(table = table_name, error = %e, "Failed to record issue");
                    }
                }
            }

            offset += pulled;
            if pulled < batch_size {
                break;
            }
        }

        let anomalies = self
            .run_outlier_rules(table_name, pk_columns, &outlier_rules, &mut counts)
            .await?;

        let weighted = counts.weighted();
        Ok(CheckedTable {
            score: TableScore {
                table: table_name.to_string(),
                rows_checked,
                counts,
                score: table_score(rows_checked, weighted),
                completeness: completeness.rate(),
                accuracy: accuracy.rate(),
                consistency: consistency.rate(),
            },
            anomalies,
        })
    }

    /// Evaluate `statistical_outlier` rules over sampled distributions.
    /// Each detection is both an issue and a `quality.anomalies` row.
    async fn run_outlier_rules(
        &self,
        table_name: &str,
        pk_columns: &[String],
        rules: &[QualityRule],
        counts: &mut SeverityCounts,
    ) -> Result<u64, EngineError> {
        let mut anomaly_count = 0u64;
        for rule in rules {
            let Some(field) = rule.field.as_deref() else {
                continue;
            };
            let method: OutlierMethod = match rule
                .config
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or("zscore")
                .parse()
            {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(rule_id = rule.id, error = %e, "Skipping outlier rule");
                    continue;
                }
            };
            let threshold = rule
                .config
                .get("threshold")
                .and_then(Value::as_f64)
                .unwrap_or(3.0);

            let samples = RowStore::sample_column(
                &self.production,
                table_name,
                field,
                pk_columns,
                self.config.report_sample_ceiling,
            )
            .await?;
            let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();

            for found in outlier::detect(&values, method, threshold) {
                let (record_id, value) = &samples[found.index];
                counts.add(rule.severity);
                anomaly_count += 1;

                let anomaly = NewAnomaly {
                    table_name: table_name.to_string(),
                    field_name: field.to_string(),
                    record_id: record_id.clone(),
                    anomaly_type: match method {
                        OutlierMethod::ZScore => "zscore".to_string(),
                        OutlierMethod::Iqr => "iqr".to_string(),
                    },
                    score: found.score,
                };
                if let Err(e) = AnomalyRepo::insert(&self.app, &anomaly).await {
                    tracing::error!(table = table_name, error = %e, "Failed to record anomaly");
                }

                let issue = NewIssue {
                    rule_id: Some(rule.id),
                    job_id: None,
                    table_name: table_name.to_string(),
                    field_name: Some(field.to_string()),
                    record_id: record_id.clone(),
                    issue_type: "statistical_outlier".to_string(),
                    issue_value: serde_json::Number::from_f64(*value).map(Value::Number),
                    severity: rule.severity,
                };
                if let Err(e) = IssueRepo::insert_open(&self.app, &issue).await {
                    tracing::error!(table = table_name, error = %e, "Failed to record issue");
                }
            }
        }
        Ok(anomaly_count)
    }

    async fn build_context(&self, rules: &[QualityRule]) -> EvalContext {
        let mut ctx = EvalContext::default();
        for rule in rules {
            if rule.rule_type != RuleType::Referential {
                continue;
            }
            let (Some(ref_table), Some(ref_field)) = (
                rule.config.get("ref_table").and_then(Value::as_str),
                rule.config.get("ref_field").and_then(Value::as_str),
            ) else {
                continue;
            };
            let key = (ref_table.to_string(), ref_field.to_string());
            if ctx.reference_sets.contains_key(&key) {
                continue;
            }
            match RowStore::reference_set(&self.production, ref_table, ref_field).await {
                Ok(set) => {
                    ctx.reference_sets.insert(key, set);
                }
                Err(e) => {
                    tracing::warn!(ref_table, ref_field, error = %e, "Reference set unavailable");
                }
            }
        }
        ctx
    }

    // -----------------------------------------------------------------------
    // Alert dispatch
    // -----------------------------------------------------------------------

    /// Dispatch each active alert whose conditions match, at most once per
    /// (alert, report) pair. Notification failures never propagate.
    async fn dispatch_alerts(&self, report: &QualityReport, summary: &ReportSummary) {
        let alerts = match AlertRepo::list_active(&self.app).await {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load alerts");
                return;
            }
        };

        for alert in alerts {
            let threshold: Severity = match alert.severity_threshold.parse() {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(alert_id = alert.id, error = %e, "Skipping alert");
                    continue;
                }
            };
            let conditions: AlertConditions =
                match serde_json::from_value(alert.conditions.clone()) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(alert_id = alert.id, error = %e, "Unparseable alert conditions");
                        continue;
                    }
                };
            if !conditions.matches(threshold, summary) {
                continue;
            }
            match AlertRepo::record_dispatch(&self.app, alert.id, report.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(alert_id = alert.id, error = %e, "Dispatch ledger failed");
                    continue;
                }
            }

            let subject = format!(
                "[data quality] {} (report #{})",
                alert.alert_type, report.id
            );
            let body = format!(
                "Alert {} matched report #{}.\nOverall score: {}\nOpen issues: {} \
                 (critical: {}, error: {}, warning: {}, info: {})\nAnomalies: {}",
                alert.alert_type,
                report.id,
                summary
                    .overall_score
                    .map(|s| format!("{s:.1}"))
                    .unwrap_or_else(|| "n/a".to_string()),
                summary.counts.total(),
                summary.counts.critical,
                summary.counts.error,
                summary.counts.warning,
                summary.counts.info,
                summary.anomalies,
            );

            let channels: Vec<Option<String>> = if alert.channels.is_empty() {
                vec![None]
            } else {
                alert.channels.iter().cloned().map(Some).collect()
            };
            let recipients: Vec<Option<String>> = if alert.recipients.is_empty() {
                vec![None]
            } else {
                alert.recipients.iter().cloned().map(Some).collect()
            };

            for channel in &channels {
                for recipient in &recipients {
                    let notification = Notification {
                        alert_id: Some(alert.id),
                        subject: subject.clone(),
                        body: body.clone(),
                        severity: threshold,
                        channel: channel.clone(),
                        recipient: recipient.clone(),
                    };
                    let deliveries = self.router.notify(&notification).await;
                    tracing::info!(
                        alert_id = alert.id,
                        report_id = report.id,
                        deliveries = deliveries.len(),
                        "Alert dispatched"
                    );
                }
            }
        }
    }
}

struct CheckedTable {
    score: TableScore,
    anomalies: u64,
}
