//! Handlers for the `/sanitization/rules` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use parcelsync_core::types::DbId;
use parcelsync_core::CoreError;
use parcelsync_db::models::sanitization_rule::{NewSanitizationRule, UpdateSanitizationRule};
use parcelsync_db::repositories::SanitizationRuleRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/sanitization/rules
pub async fn list_rules(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rules = SanitizationRuleRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse { data: rules }))
}

/// POST /api/v1/sanitization/rules
///
/// Create a rule. A second active rule for the same (table, field)
/// surfaces as 409 via the partial unique index.
pub async fn create_rule(
    State(state): State<AppState>,
    Json(input): Json<NewSanitizationRule>,
) -> AppResult<impl IntoResponse> {
    SanitizationRuleRepo::validate(&input)?;
    let rule = SanitizationRuleRepo::create(&state.pool, &input).await?;
    tracing::info!(
        rule_id = rule.id,
        table = %rule.table_name,
        field = %rule.field_name,
        strategy = %rule.strategy,
        "Sanitization rule created"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: rule })))
}

/// PUT /api/v1/sanitization/rules/{id}
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateSanitizationRule>,
) -> AppResult<impl IntoResponse> {
    if let Some(strategy) = &input.strategy {
        strategy
            .parse::<parcelsync_core::sanitize::Strategy>()
            .map_err(|e| AppError::Core(CoreError::ConfigInvalid(e)))?;
    }
    let rule = SanitizationRuleRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SanitizationRule",
            id,
        }))?;
    Ok(Json(DataResponse { data: rule }))
}

/// DELETE /api/v1/sanitization/rules/{id}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !SanitizationRuleRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "SanitizationRule",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}
