//! Worker process: runs the job dispatcher and the schedule tick loop
//! against the shared application database.
//!
//! The API process submits jobs; this process claims and executes them.
//! Both binaries can run side by side — `FOR UPDATE SKIP LOCKED` claiming
//! keeps multiple workers from double-running a job.

use std::sync::Arc;

use parcelsync_engine::lock::JobLockRegistry;
use parcelsync_engine::{EngineConfig, JobDispatcher, Scheduler, SyncEngine};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parcelsync_worker=info,parcelsync_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();

    // --- Databases ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let production_url =
        std::env::var("PRODUCTION_DATABASE_URL").expect("PRODUCTION_DATABASE_URL must be set");
    let training_url =
        std::env::var("TRAINING_DATABASE_URL").expect("TRAINING_DATABASE_URL must be set");

    // Pools stay one connection larger than the job concurrency so the
    // scheduler and health probes never starve.
    let pool_size = (config.max_concurrent_jobs as u32 + 1).max(parcelsync_db::DEFAULT_POOL_SIZE);
    let app = parcelsync_db::create_pool_sized(&database_url, pool_size)
        .await
        .expect("Failed to connect to application database");
    let production = parcelsync_db::create_pool_sized(&production_url, pool_size)
        .await
        .expect("Failed to connect to production database");
    let training = parcelsync_db::create_pool_sized(&training_url, pool_size)
        .await
        .expect("Failed to connect to training database");

    parcelsync_db::run_migrations(&app)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Engine and services ---
    let locks = JobLockRegistry::new();
    let engine = Arc::new(SyncEngine::new(
        app.clone(),
        production,
        training,
        config.clone(),
        locks,
    ));

    let dispatcher = JobDispatcher::new(app.clone(), engine, config.max_concurrent_jobs);
    let scheduler = Scheduler::new(app.clone());

    let cancel = CancellationToken::new();
    let dispatcher_cancel = cancel.clone();
    let scheduler_cancel = cancel.clone();

    let dispatcher_handle = tokio::spawn(async move {
        dispatcher.run(dispatcher_cancel).await;
    });
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_cancel).await;
    });

    tracing::info!("Worker started (dispatcher + scheduler)");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl-C handler");
    tracing::info!("Shutdown signal received");

    cancel.cancel();
    let _ = dispatcher_handle.await;
    let _ = scheduler_handle.await;
    tracing::info!("Worker stopped");
}
