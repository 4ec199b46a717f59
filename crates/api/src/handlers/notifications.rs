//! Handlers for notification channel configuration and test sends.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use parcelsync_core::CoreError;
use parcelsync_db::models::notification::UpdateChannelConfig;
use parcelsync_db::repositories::NotificationRepo;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/notifications/channels
pub async fn list_channels(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let configs = NotificationRepo::list_channel_configs(&state.pool).await?;
    Ok(Json(DataResponse { data: configs }))
}

/// PUT /api/v1/notifications/channels/{channel}
///
/// Update one channel's configuration and atomically reload the router's
/// process-wide snapshot.
pub async fn update_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(input): Json<UpdateChannelConfig>,
) -> AppResult<impl IntoResponse> {
    let config = NotificationRepo::update_channel_config(&state.pool, &channel, &input)
        .await?
        .ok_or(AppError::Core(CoreError::ConfigInvalid(format!(
            "Unknown channel: {channel}"
        ))))?;

    state.notifier.reload().await?;

    Ok(Json(DataResponse { data: config }))
}

#[derive(Debug, Deserialize, Default)]
pub struct TestSendRequest {
    pub recipient: Option<String>,
}

/// POST /api/v1/notifications/test/{channel}
///
/// Test-send through the regular delivery path; the attempt lands in the
/// same delivery log as real alerts.
pub async fn test_send(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    input: Option<Json<TestSendRequest>>,
) -> AppResult<impl IntoResponse> {
    let recipient = input.and_then(|Json(r)| r.recipient);
    let deliveries = state.notifier.test_send(&channel, recipient).await;
    Ok(Json(DataResponse { data: deliveries }))
}
