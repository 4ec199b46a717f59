//! Route definitions for the `/sanitization` resources.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::sanitization;
use crate::state::AppState;

/// Routes mounted at `/sanitization`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/rules",
            get(sanitization::list_rules).post(sanitization::create_rule),
        )
        .route(
            "/rules/{id}",
            put(sanitization::update_rule).delete(sanitization::delete_rule),
        )
}
