//! Background job dispatcher.
//!
//! Polls for pending jobs every second and executes each in its own Tokio
//! task so one slow job (or notification send) cannot stall the others.
//! Uses `SELECT FOR UPDATE SKIP LOCKED` via [`JobRepo::claim_next`] to
//! prevent double-dispatch when multiple worker processes run.

use std::sync::Arc;
use std::time::Duration;

use parcelsync_db::repositories::JobRepo;
use parcelsync_db::DbPool;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::sync::SyncEngine;

/// Default polling interval for the dispatcher loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Claims pending jobs and hands them to the sync engine.
pub struct JobDispatcher {
    pool: DbPool,
    engine: Arc<SyncEngine>,
    concurrency: Arc<Semaphore>,
    max_permits: u32,
    poll_interval: Duration,
}

impl JobDispatcher {
    pub fn new(pool: DbPool, engine: Arc<SyncEngine>, max_concurrent_jobs: usize) -> Self {
        let max_permits = max_concurrent_jobs.max(1) as u32;
        Self {
            pool,
            engine,
            concurrency: Arc::new(Semaphore::new(max_permits as usize)),
            max_permits,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Job dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.try_dispatch().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }

        // Drain: re-acquiring every permit waits for in-flight jobs.
        let _ = self.concurrency.acquire_many(self.max_permits).await;
        tracing::info!("All in-flight jobs drained");
    }

    /// One dispatch cycle: claim jobs while worker slots are free.
    async fn try_dispatch(&self) -> Result<(), sqlx::Error> {
        loop {
            let Ok(permit) = Arc::clone(&self.concurrency).try_acquire_owned() else {
                // All worker slots busy; try again next tick.
                return Ok(());
            };

            let Some(job) = JobRepo::claim_next(&self.pool).await? else {
                drop(permit);
                return Ok(());
            };

            tracing::info!(job_id = job.id, job_type = %job.job_type, "Job claimed");

            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move {
                engine.execute(job).await;
                drop(permit);
            });
        }
    }
}
