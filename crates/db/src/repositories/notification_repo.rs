//! Repository for `notifications.channel_configs` and
//! `notifications.deliveries`.

use parcelsync_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::{
    ChannelConfig, DeliveryListQuery, NotificationDelivery, UpdateChannelConfig,
};

/// Column list for `notifications.channel_configs` queries.
const CONFIG_COLUMNS: &str = "id, channel, enabled, config, severity_routes, updated_at";

/// Column list for `notifications.deliveries` queries.
const DELIVERY_COLUMNS: &str = "\
    id, alert_id, subject, body, severity, channel, recipient, status, attempts, \
    error, created_at, delivered_at";

/// Maximum page size for delivery listing.
const MAX_LIMIT: i64 = 500;

/// Default page size for delivery listing.
const DEFAULT_LIMIT: i64 = 100;

/// Provides config and delivery-log operations for the notification router.
pub struct NotificationRepo;

impl NotificationRepo {
    /// All channel configurations.
    pub async fn list_channel_configs(pool: &PgPool) -> Result<Vec<ChannelConfig>, sqlx::Error> {
        let query =
            format!("SELECT {CONFIG_COLUMNS} FROM notifications.channel_configs ORDER BY channel");
        sqlx::query_as::<_, ChannelConfig>(&query).fetch_all(pool).await
    }

    /// Update one channel's configuration, returning the new row.
    pub async fn update_channel_config(
        pool: &PgPool,
        channel: &str,
        input: &UpdateChannelConfig,
    ) -> Result<Option<ChannelConfig>, sqlx::Error> {
        let query = format!(
            "UPDATE notifications.channel_configs \
             SET enabled = COALESCE($2, enabled), \
                 config = COALESCE($3, config), \
                 severity_routes = COALESCE($4, severity_routes), \
                 updated_at = NOW() \
             WHERE channel = $1 \
             RETURNING {CONFIG_COLUMNS}"
        );
        sqlx::query_as::<_, ChannelConfig>(&query)
            .bind(channel)
            .bind(input.enabled)
            .bind(&input.config)
            .bind(&input.severity_routes)
            .fetch_optional(pool)
            .await
    }

    /// Create a queued delivery row for an attempted send.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_queued(
        pool: &PgPool,
        alert_id: Option<DbId>,
        subject: &str,
        body: &str,
        severity: &str,
        channel: &str,
        recipient: &str,
    ) -> Result<NotificationDelivery, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications.deliveries \
                 (alert_id, subject, body, severity, channel, recipient, status, attempts) \
             VALUES ($1, $2, $3, $4, $5, $6, 'queued', 0) \
             RETURNING {DELIVERY_COLUMNS}"
        );
        sqlx::query_as::<_, NotificationDelivery>(&query)
            .bind(alert_id)
            .bind(subject)
            .bind(body)
            .bind(severity)
            .bind(channel)
            .bind(recipient)
            .fetch_one(pool)
            .await
    }

    /// Mark a delivery sent.
    pub async fn mark_sent(pool: &PgPool, id: DbId, attempts: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notifications.deliveries \
             SET status = 'sent', attempts = $2, delivered_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(attempts)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a delivery failed with the channel's error string.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        attempts: i32,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notifications.deliveries \
             SET status = 'failed', attempts = $2, error = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(attempts)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List deliveries with optional filters, newest first.
    pub async fn list_deliveries(
        pool: &PgPool,
        params: &DeliveryListQuery,
    ) -> Result<Vec<NotificationDelivery>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;
        if params.channel.is_some() {
            conditions.push(format!("channel = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {DELIVERY_COLUMNS} FROM notifications.deliveries \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, NotificationDelivery>(&query);
        if let Some(c) = &params.channel {
            q = q.bind(c);
        }
        if let Some(s) = &params.status {
            q = q.bind(s);
        }
        q = q.bind(limit).bind(offset);
        q.fetch_all(pool).await
    }
}
