//! Handlers for the `/schedules` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use parcelsync_core::cron::validate_schedule;
use parcelsync_core::jobs::JobType;
use parcelsync_core::types::DbId;
use parcelsync_core::CoreError;
use parcelsync_db::models::job::SubmitJob;
use parcelsync_db::models::schedule::{NewSchedule, SyncSchedule, UpdateSchedule};
use parcelsync_db::repositories::{JobRepo, ScheduleRepo};
use parcelsync_engine::scheduler::compute_next_run;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

async fn find_schedule(pool: &sqlx::PgPool, id: DbId) -> AppResult<SyncSchedule> {
    ScheduleRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Schedule",
            id,
        }))
}

/// GET /api/v1/schedules
pub async fn list_schedules(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let schedules = ScheduleRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse { data: schedules }))
}

/// POST /api/v1/schedules
///
/// Create a schedule. The definition is validated (known job type,
/// exactly one of cron/interval, parseable expression) before anything
/// is stored, and the first `next_run` is computed immediately.
pub async fn create_schedule(
    State(state): State<AppState>,
    Json(input): Json<NewSchedule>,
) -> AppResult<impl IntoResponse> {
    input
        .job_type
        .parse::<JobType>()
        .map_err(|e: String| AppError::Core(CoreError::ConfigInvalid(e)))?;
    ScheduleRepo::validate(&input)?;

    // Compute the first next_run from "now" with a throwaway schedule
    // carrying the new recurrence.
    let probe = SyncSchedule {
        id: 0,
        name: input.name.clone(),
        job_type: input.job_type.clone(),
        schedule_type: String::new(),
        cron_expression: input.cron_expression.clone(),
        interval_hours: input.interval_hours,
        parameters: serde_json::json!({}),
        is_active: input.is_active,
        last_run: None,
        next_run: None,
        last_job_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let next_run = if input.is_active {
        compute_next_run(&probe, Utc::now())
    } else {
        None
    };

    let schedule = ScheduleRepo::create(&state.pool, &input, next_run).await?;
    tracing::info!(schedule_id = schedule.id, name = %schedule.name, "Schedule created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: schedule })))
}

/// PUT /api/v1/schedules/{id}
pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateSchedule>,
) -> AppResult<impl IntoResponse> {
    let current = find_schedule(&state.pool, id).await?;

    // Validate the post-update recurrence definition.
    let cron = input
        .cron_expression
        .clone()
        .or(current.cron_expression.clone());
    let interval = input.interval_hours.or(current.interval_hours);
    // An update may switch recurrence kinds; only one may survive.
    let (cron, interval) = match (&input.cron_expression, &input.interval_hours) {
        (Some(_), None) => (cron, None),
        (None, Some(_)) => (None, interval),
        _ => (cron, interval),
    };
    validate_schedule(cron.as_deref(), interval.map(i64::from))
        .map_err(AppError::Core)?;

    let probe = SyncSchedule {
        cron_expression: cron,
        interval_hours: interval,
        ..current
    };
    let is_active = input.is_active.unwrap_or(probe.is_active);
    let next_run = if is_active {
        compute_next_run(&probe, Utc::now())
    } else {
        None
    };

    let updated = ScheduleRepo::update(
        &state.pool,
        id,
        &input,
        probe.cron_expression.as_deref(),
        probe.interval_hours,
        next_run,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Schedule",
        id,
    }))?;
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/schedules/{id}
pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !ScheduleRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Schedule",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/schedules/{id}/run-now
///
/// Submit the schedule's job immediately without altering the recurrence.
pub async fn run_now(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let schedule = find_schedule(&state.pool, id).await?;
    let job = JobRepo::submit(
        &state.pool,
        "run-now",
        &SubmitJob {
            job_type: schedule.job_type.clone(),
            parameters: Some(schedule.parameters.clone()),
            idempotency_key: None,
        },
    )
    .await?;
    tracing::info!(schedule_id = id, job_id = job.id, "Schedule run-now");
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// POST /api/v1/schedules/{id}/pause
///
/// Clears `next_run`; ticks skip the schedule until resume.
pub async fn pause_schedule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let _ = find_schedule(&state.pool, id).await?;
    ScheduleRepo::pause(&state.pool, id).await?;
    let schedule = find_schedule(&state.pool, id).await?;
    Ok(Json(DataResponse { data: schedule }))
}

/// POST /api/v1/schedules/{id}/resume
///
/// Recomputes `next_run` from now, so a schedule paused across several
/// missed firings resumes one full period out instead of firing a
/// backlog.
pub async fn resume_schedule(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let schedule = find_schedule(&state.pool, id).await?;
    let next_run = compute_next_run(&schedule, Utc::now());
    ScheduleRepo::resume(&state.pool, id, next_run).await?;
    let schedule = find_schedule(&state.pool, id).await?;
    Ok(Json(DataResponse { data: schedule }))
}
