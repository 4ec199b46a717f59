//! Database access layer: pool helpers, row models, and repositories.
//!
//! All persisted entities live in the application database, namespaced by
//! logical schema: `sync.*` (jobs, logs, table/field configuration,
//! sanitization), `quality.*` (rules, issues, reports, anomalies, alerts),
//! and `notifications.*` (channel configs, deliveries).

pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Default size of each connection pool. Must stay at least one above the
/// configured job concurrency so a connection remains free for the
/// scheduler and health probes.
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    create_pool_sized(database_url, DEFAULT_POOL_SIZE).await
}

/// Create a bounded connection pool with an explicit size.
pub async fn create_pool_sized(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply embedded migrations to the application database.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
