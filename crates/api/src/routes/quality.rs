//! Route definitions for the `/quality` resources.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::quality;
use crate::state::AppState;

/// Routes mounted at `/quality`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rules", get(quality::list_rules).post(quality::create_rule))
        .route(
            "/rules/{id}",
            put(quality::update_rule).delete(quality::delete_rule),
        )
        .route("/issues", get(quality::list_issues))
        .route("/issues/{id}", put(quality::update_issue))
        .route(
            "/reports",
            get(quality::list_reports).post(quality::trigger_report),
        )
        .route("/reports/{id}", get(quality::get_report))
        .route("/reports/{id}/download", get(quality::download_report))
        .route(
            "/alerts",
            get(quality::list_alerts).post(quality::create_alert),
        )
        .route(
            "/alerts/{id}",
            put(quality::update_alert).delete(quality::delete_alert),
        )
        .route("/notifications", get(quality::list_notifications))
}
