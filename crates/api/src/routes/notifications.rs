//! Route definitions for notification channel configuration.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels", get(notifications::list_channels))
        .route("/channels/{channel}", put(notifications::update_channel))
        .route("/test/{channel}", post(notifications::test_send))
}
