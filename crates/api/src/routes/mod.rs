pub mod health;
pub mod jobs;
pub mod notifications;
pub mod quality;
pub mod sanitization;
pub mod schedules;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                               list, submit
/// /jobs/{id}                          get
/// /jobs/{id}/cancel|pause|resume      lifecycle (POST)
/// /jobs/{id}/logs                     log listing
///
/// /schedules                          list, create
/// /schedules/{id}                     update, delete
/// /schedules/{id}/run-now|pause|resume
///
/// /quality/rules[/{id}]               rules CRUD
/// /quality/issues[/{id}]              issue listing + lifecycle
/// /quality/reports[/{id}[/download]]  report trigger/read/export
/// /quality/alerts[/{id}]              alerts CRUD
/// /quality/notifications              delivery log
///
/// /sanitization/rules[/{id}]          sanitization rules CRUD
///
/// /notifications/channels[/{channel}] channel config get/update
/// /notifications/test/{channel}       test send
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/schedules", schedules::router())
        .nest("/quality", quality::router())
        .nest("/sanitization", sanitization::router())
        .nest("/notifications", notifications::router())
}
