//! Severity-based notification routing.
//!
//! [`NotificationRouter`] fans an alert out across the configured channels.
//! Channel configuration is a process-wide, read-mostly snapshot loaded
//! from `notifications.channel_configs` and swapped atomically on reload.
//! Every attempted send produces a delivery row; a failing channel is
//! marked `failed` and the remaining channels still deliver.

use std::collections::HashMap;

use parcelsync_core::severity::Severity;
use parcelsync_core::types::DbId;
use parcelsync_db::models::notification::{ChannelConfig, NotificationDelivery};
use parcelsync_db::repositories::NotificationRepo;
use parcelsync_db::DbPool;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::delivery::email::EmailDelivery;
use crate::delivery::sms::SmsDelivery;
use crate::delivery::webhook::WebhookDelivery;

/// Channel names, matching the `notifications.channel_configs` seed rows.
pub const CHANNEL_EMAIL: &str = "email";
pub const CHANNEL_CHAT: &str = "chat";
pub const CHANNEL_SMS: &str = "sms";

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// One alert to route.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The triggering alert, when one exists (test sends carry none).
    pub alert_id: Option<DbId>,
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    /// Pin delivery to a single channel; `None` fans out per severity
    /// routes.
    pub channel: Option<String>,
    /// Override the channel's configured recipient.
    pub recipient: Option<String>,
}

// ---------------------------------------------------------------------------
// NotificationRouter
// ---------------------------------------------------------------------------

/// Routes alerts to delivery channels per severity configuration.
pub struct NotificationRouter {
    pool: DbPool,
    webhook: WebhookDelivery,
    configs: RwLock<HashMap<String, ChannelConfig>>,
}

impl NotificationRouter {
    /// Create a router with the current stored channel configuration.
    pub async fn new(pool: DbPool) -> Result<Self, sqlx::Error> {
        let configs = Self::load_configs(&pool).await?;
        Ok(Self {
            pool,
            webhook: WebhookDelivery::new(),
            configs: RwLock::new(configs),
        })
    }

    /// Atomically replace the channel config snapshot from the database.
    pub async fn reload(&self) -> Result<(), sqlx::Error> {
        let fresh = Self::load_configs(&self.pool).await?;
        *self.configs.write().await = fresh;
        tracing::info!("Notification channel configuration reloaded");
        Ok(())
    }

    async fn load_configs(pool: &DbPool) -> Result<HashMap<String, ChannelConfig>, sqlx::Error> {
        let rows = NotificationRepo::list_channel_configs(pool).await?;
        Ok(rows.into_iter().map(|c| (c.channel.clone(), c)).collect())
    }

    /// Route one notification, returning the delivery rows produced.
    ///
    /// With an explicit channel, exactly that channel is attempted
    /// (enabled or not — this is how test sends exercise a channel).
    /// Otherwise every enabled channel whose severity route admits the
    /// notification's severity delivers.
    pub async fn notify(&self, notification: &Notification) -> Vec<NotificationDelivery> {
        let configs = self.configs.read().await.clone();
        let mut deliveries = Vec::new();

        match &notification.channel {
            Some(channel) => {
                if let Some(config) = configs.get(channel) {
                    deliveries.push(self.deliver_to(config, notification).await);
                } else {
                    tracing::warn!(channel, "Unknown notification channel");
                }
            }
            None => {
                for config in configs.values() {
                    if !config.enabled || !routes_severity(config, notification.severity) {
                        continue;
                    }
                    deliveries.push(self.deliver_to(config, notification).await);
                }
            }
        }

        deliveries.into_iter().flatten().collect()
    }

    /// Test-send through the regular delivery path and delivery log.
    pub async fn test_send(
        &self,
        channel: &str,
        recipient: Option<String>,
    ) -> Vec<NotificationDelivery> {
        let notification = Notification {
            alert_id: None,
            subject: "parcelsync test notification".to_string(),
            body: "This is a test notification from the sync engine.".to_string(),
            severity: Severity::Info,
            channel: Some(channel.to_string()),
            recipient,
        };
        self.notify(&notification).await
    }

    /// Attempt one channel: create the delivery row, run the adapter, and
    /// record the outcome. Returns `None` only if the delivery row itself
    /// could not be created.
    async fn deliver_to(
        &self,
        config: &ChannelConfig,
        notification: &Notification,
    ) -> Option<NotificationDelivery> {
        let recipient = notification
            .recipient
            .clone()
            .or_else(|| default_recipient(config))
            .unwrap_or_default();

        let row = match NotificationRepo::insert_queued(
            &self.pool,
            notification.alert_id,
            &notification.subject,
            &notification.body,
            notification.severity.as_str(),
            &config.channel,
            &recipient,
        )
        .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(channel = %config.channel, error = %e, "Failed to log delivery");
                return None;
            }
        };

        let (attempts, outcome) = if recipient.is_empty() {
            (0, Err("No recipient configured for channel".to_string()))
        } else {
            self.send_via_channel(config, notification, &recipient).await
        };

        let mut row = row;
        row.attempts = attempts as i32;
        let updated = match &outcome {
            Ok(()) => {
                row.status = "sent".to_string();
                row.delivered_at = Some(chrono::Utc::now());
                NotificationRepo::mark_sent(&self.pool, row.id, row.attempts).await
            }
            Err(error) => {
                tracing::warn!(
                    channel = %config.channel,
                    delivery_id = row.id,
                    error,
                    "Notification delivery failed"
                );
                row.status = "failed".to_string();
                row.error = Some(error.clone());
                NotificationRepo::mark_failed(&self.pool, row.id, row.attempts, error).await
            }
        };
        if let Err(e) = updated {
            tracing::error!(delivery_id = row.id, error = %e, "Failed to update delivery status");
        }
        Some(row)
    }

    async fn send_via_channel(
        &self,
        config: &ChannelConfig,
        notification: &Notification,
        recipient: &str,
    ) -> (u32, Result<(), String>) {
        match config.channel.as_str() {
            CHANNEL_EMAIL => {
                let result = EmailDelivery::deliver(
                    &config.config,
                    recipient,
                    &notification.subject,
                    &notification.body,
                )
                .await;
                (1, result.map_err(|e| e.to_string()))
            }
            CHANNEL_CHAT => {
                let (attempts, result) = self
                    .webhook
                    .deliver(
                        recipient,
                        &notification.subject,
                        &notification.body,
                        notification.severity,
                    )
                    .await;
                (attempts, result.map_err(|e| e.to_string()))
            }
            CHANNEL_SMS => {
                let result =
                    SmsDelivery::deliver(&config.config, recipient, &notification.subject).await;
                (1, result.map_err(|e| e.to_string()))
            }
            other => (0, Err(format!("Unknown channel: {other}"))),
        }
    }
}

/// Whether the channel's severity route admits this severity.
fn routes_severity(config: &ChannelConfig, severity: Severity) -> bool {
    config
        .severity_routes
        .get(severity.as_str())
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// The channel's configured default recipient: an address for email, a
/// webhook URL for chat, a phone number for SMS.
fn default_recipient(config: &ChannelConfig) -> Option<String> {
    let key = match config.channel.as_str() {
        CHANNEL_EMAIL => "recipient",
        CHANNEL_CHAT => "webhook_url",
        CHANNEL_SMS => "phone",
        _ => return None,
    };
    config
        .config
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn config(channel: &str, enabled: bool, routes: Value) -> ChannelConfig {
        ChannelConfig {
            id: 1,
            channel: channel.to_string(),
            enabled,
            config: json!({}),
            severity_routes: routes,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn severity_routing_respects_map() {
        let c = config("email", true, json!({"error": true, "info": false}));
        assert!(routes_severity(&c, Severity::Error));
        assert!(!routes_severity(&c, Severity::Info));
        // Unlisted severities do not deliver.
        assert!(!routes_severity(&c, Severity::Warning));
    }

    #[test]
    fn default_recipient_is_per_channel() {
        let mut c = config("chat", true, json!({}));
        c.config = json!({"webhook_url": "https://chat.example/hook"});
        assert_eq!(
            default_recipient(&c).as_deref(),
            Some("https://chat.example/hook")
        );

        let mut e = config("email", true, json!({}));
        e.config = json!({"recipient": "ops@assessor.example"});
        assert_eq!(default_recipient(&e).as_deref(), Some("ops@assessor.example"));
    }

    #[test]
    fn unknown_channel_has_no_default_recipient() {
        let c = config("pager", true, json!({}));
        assert_eq!(default_recipient(&c), None);
    }
}
