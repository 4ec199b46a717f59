use std::sync::Arc;

use parcelsync_engine::ReportRunner;
use parcelsync_notify::NotificationRouter;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Application database connection pool.
    pub pool: parcelsync_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// On-demand quality report runner.
    pub report_runner: Arc<ReportRunner>,
    /// Notification router (channel config reloads, test sends).
    pub notifier: Arc<NotificationRouter>,
}
