//! Handlers for the `/quality` resources: rules, issues, reports, alerts,
//! and the notification delivery log.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use parcelsync_core::types::DbId;
use parcelsync_core::CoreError;
use parcelsync_db::models::alert::{NewAlert, UpdateAlert};
use parcelsync_db::models::issue::{IssueListQuery, UpdateIssueStatus};
use parcelsync_db::models::notification::DeliveryListQuery;
use parcelsync_db::models::quality_rule::{NewQualityRule, UpdateQualityRule};
use parcelsync_db::models::report::TriggerReport;
use parcelsync_db::repositories::{AlertRepo, IssueRepo, NotificationRepo, QualityRuleRepo, ReportRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RuleListQuery {
    pub table_name: Option<String>,
}

/// GET /api/v1/quality/rules
pub async fn list_rules(
    State(state): State<AppState>,
    Query(params): Query<RuleListQuery>,
) -> AppResult<impl IntoResponse> {
    let rules = QualityRuleRepo::list(&state.pool, params.table_name.as_deref()).await?;
    Ok(Json(DataResponse { data: rules }))
}

/// POST /api/v1/quality/rules
///
/// Create a rule. `rule_config` is validated against the schema for its
/// rule type; invalid configs never reach the database.
pub async fn create_rule(
    State(state): State<AppState>,
    Json(input): Json<NewQualityRule>,
) -> AppResult<impl IntoResponse> {
    QualityRuleRepo::validate(&input)?;
    let rule = QualityRuleRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rule })))
}

/// PUT /api/v1/quality/rules/{id}
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateQualityRule>,
) -> AppResult<impl IntoResponse> {
    // Re-validate when the config or activation changes.
    if input.rule_config.is_some() || input.is_active == Some(true) {
        let current = QualityRuleRepo::find_by_id(&state.pool, id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound { entity: "Rule", id }))?;
        let candidate = NewQualityRule {
            table_name: current.table_name.clone(),
            field_name: current.field_name.clone(),
            rule_type: current.rule_type.clone(),
            rule_config: input
                .rule_config
                .clone()
                .unwrap_or(current.rule_config.clone()),
            severity: input.severity.clone().unwrap_or(current.severity.clone()),
            is_active: input.is_active.unwrap_or(current.is_active),
        };
        QualityRuleRepo::validate(&candidate)?;
    }

    let rule = QualityRuleRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Rule", id }))?;
    Ok(Json(DataResponse { data: rule }))
}

/// DELETE /api/v1/quality/rules/{id}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !QualityRuleRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Rule", id }));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// GET /api/v1/quality/issues
pub async fn list_issues(
    State(state): State<AppState>,
    Query(params): Query<IssueListQuery>,
) -> AppResult<impl IntoResponse> {
    let issues = IssueRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: issues }))
}

/// PUT /api/v1/quality/issues/{id}
///
/// Transition an issue through its lifecycle
/// (`open -> acknowledged? -> resolved | suppressed`).
pub async fn update_issue(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateIssueStatus>,
) -> AppResult<impl IntoResponse> {
    let issue = IssueRepo::update_status(&state.pool, id, &input)
        .await?
        .ok_or(AppError::BadRequest(format!(
            "Issue {id} not found or transition to {:?} not allowed",
            input.status
        )))?;
    Ok(Json(DataResponse { data: issue }))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// POST /api/v1/quality/reports
///
/// Run a quality report synchronously and return it. Matching alerts are
/// dispatched as a side effect.
pub async fn trigger_report(
    State(state): State<AppState>,
    Json(input): Json<TriggerReport>,
) -> AppResult<impl IntoResponse> {
    let report = state.report_runner.run(input.name, input.tables).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: report })))
}

/// GET /api/v1/quality/reports
pub async fn list_reports(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let reports = ReportRepo::list_recent(&state.pool).await?;
    Ok(Json(DataResponse { data: reports }))
}

/// GET /api/v1/quality/reports/{id}
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = ReportRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Report",
            id,
        }))?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/quality/reports/{id}/download
///
/// Per-table breakdown as CSV.
pub async fn download_report(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = ReportRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Report",
            id,
        }))?;

    let mut csv = String::from(
        "table,rows_checked,score,completeness,accuracy,consistency,info,warning,error,critical\n",
    );
    if let Some(tables) = report.report_data.get("tables").and_then(|t| t.as_array()) {
        for table in tables {
            let field = |key: &str| {
                table
                    .get(key)
                    .map(|v| match v {
                        serde_json::Value::Null => String::new(),
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default()
            };
            let count = |key: &str| {
                table
                    .get("counts")
                    .and_then(|c| c.get(key))
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            };
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{}\n",
                field("table"),
                field("rows_checked"),
                field("score"),
                field("completeness"),
                field("accuracy"),
                field("consistency"),
                count("info"),
                count("warning"),
                count("error"),
                count("critical"),
            ));
        }
    }

    let filename = format!("quality-report-{id}.csv");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    ))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// GET /api/v1/quality/alerts
pub async fn list_alerts(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let alerts = AlertRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse { data: alerts }))
}

/// POST /api/v1/quality/alerts
pub async fn create_alert(
    State(state): State<AppState>,
    Json(input): Json<NewAlert>,
) -> AppResult<impl IntoResponse> {
    input
        .severity_threshold
        .parse::<parcelsync_core::Severity>()
        .map_err(|e| AppError::Core(CoreError::ConfigInvalid(e)))?;
    let alert = AlertRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: alert })))
}

/// PUT /api/v1/quality/alerts/{id}
pub async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateAlert>,
) -> AppResult<impl IntoResponse> {
    if let Some(threshold) = &input.severity_threshold {
        threshold
            .parse::<parcelsync_core::Severity>()
            .map_err(|e| AppError::Core(CoreError::ConfigInvalid(e)))?;
    }
    let alert = AlertRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Alert",
            id,
        }))?;
    Ok(Json(DataResponse { data: alert }))
}

/// DELETE /api/v1/quality/alerts/{id}
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !AlertRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Alert",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Notification deliveries
// ---------------------------------------------------------------------------

/// GET /api/v1/quality/notifications
///
/// The alert delivery log, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<DeliveryListQuery>,
) -> AppResult<impl IntoResponse> {
    let deliveries = NotificationRepo::list_deliveries(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: deliveries }))
}
