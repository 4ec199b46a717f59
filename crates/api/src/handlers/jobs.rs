//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use parcelsync_core::jobs::JobType;
use parcelsync_core::types::DbId;
use parcelsync_core::CoreError;
use parcelsync_db::models::job::{JobListQuery, SubmitJob, SyncJob};
use parcelsync_db::models::job_log::JobLogQuery;
use parcelsync_db::repositories::{JobLogRepo, JobRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_job(pool: &sqlx::PgPool, job_id: DbId) -> AppResult<SyncJob> {
    JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Submit a new sync job. Returns 201 with the created job. The job
/// starts in `pending` status and is picked up by the dispatcher. A job
/// whose (job_type, direction) key is already active is refused with
/// `already_running` and no job is created.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let job_type: JobType = input
        .job_type
        .parse()
        .map_err(|e: String| AppError::Core(CoreError::ConfigInvalid(e)))?;

    if JobRepo::has_active_of_type(&state.pool, job_type.as_str()).await? {
        return Err(AppError::AlreadyRunning(format!(
            "A {job_type} job is already pending or running"
        )));
    }

    let job = JobRepo::submit(&state.pool, "api", &input).await?;

    tracing::info!(job_id = job.id, job_type = %job.job_type, "Job submitted");

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List jobs with optional `status_id`, `job_type`, `limit`, and `offset`
/// query parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state.pool, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Request cooperative cancellation. The engine observes the flag between
/// batches; a still-pending job is cancelled outright.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let _ = find_job(&state.pool, job_id).await?;
    let accepted = JobRepo::request_cancel(&state.pool, job_id).await?;
    if !accepted {
        return Err(AppError::BadRequest(
            "Job is already in a terminal state".to_string(),
        ));
    }
    let job = find_job(&state.pool, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/pause
///
/// Request a pause. Honored between tables, never mid-batch.
pub async fn pause_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let _ = find_job(&state.pool, job_id).await?;
    let accepted = JobRepo::request_pause(&state.pool, job_id).await?;
    if !accepted {
        return Err(AppError::BadRequest("Only running jobs can pause".to_string()));
    }
    let job = find_job(&state.pool, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/resume
pub async fn resume_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let _ = find_job(&state.pool, job_id).await?;
    let accepted = JobRepo::resume(&state.pool, job_id).await?;
    if !accepted {
        return Err(AppError::BadRequest("Job is not paused".to_string()));
    }
    let job = find_job(&state.pool, job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/logs?level=&limit=
pub async fn job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Query(params): Query<JobLogQuery>,
) -> AppResult<impl IntoResponse> {
    let _ = find_job(&state.pool, job_id).await?;
    let logs = JobLogRepo::list_for_job(&state.pool, job_id, &params).await?;
    Ok(Json(DataResponse { data: logs }))
}
