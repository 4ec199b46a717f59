//! Notification channel configuration and delivery log rows.

use parcelsync_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `notifications.channel_configs` table.
///
/// One row per channel (`email`, `chat`, `sms`); process-wide and
/// reloaded atomically by the router on config update.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChannelConfig {
    pub id: DbId,
    pub channel: String,
    pub enabled: bool,
    /// Channel-specific settings (SMTP host, webhook URL, ...).
    pub config: serde_json::Value,
    /// Severity -> deliver? map, e.g. `{"error": true, "info": false}`.
    pub severity_routes: serde_json::Value,
    pub updated_at: Timestamp,
}

/// DTO for `PUT /api/v1/notifications/channels/{channel}`.
#[derive(Debug, Deserialize)]
pub struct UpdateChannelConfig {
    pub enabled: Option<bool>,
    pub config: Option<serde_json::Value>,
    pub severity_routes: Option<serde_json::Value>,
}

/// A row from the `notifications.deliveries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationDelivery {
    pub id: DbId,
    pub alert_id: Option<DbId>,
    pub subject: String,
    pub body: String,
    pub severity: String,
    pub channel: String,
    pub recipient: String,
    /// `queued`, `sent`, or `failed`.
    pub status: String,
    pub attempts: i32,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub delivered_at: Option<Timestamp>,
}

/// Query parameters for `GET /api/v1/quality/notifications`.
#[derive(Debug, Deserialize)]
pub struct DeliveryListQuery {
    pub channel: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
