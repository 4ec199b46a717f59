//! Route definitions for the `/schedules` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::schedules;
use crate::state::AppState;

/// Routes mounted at `/schedules`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route(
            "/{id}",
            put(schedules::update_schedule).delete(schedules::delete_schedule),
        )
        .route("/{id}/run-now", post(schedules::run_now))
        .route("/{id}/pause", post(schedules::pause_schedule))
        .route("/{id}/resume", post(schedules::resume_schedule))
}
