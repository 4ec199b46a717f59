//! Schedule tick loop.
//!
//! Every minute, active schedules whose `next_run` has arrived submit
//! their job through the job repository. An overrunning job makes the
//! schedule skip (its `next_run` is pushed forward without firing), never
//! stack. The scheduler holds no durable state of its own — the
//! `sync.schedules` table is the store of record.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parcelsync_core::cron::{interval_next, CronExpr};
use parcelsync_core::jobs::state_machine;
use parcelsync_db::models::job::SubmitJob;
use parcelsync_db::models::schedule::SyncSchedule;
use parcelsync_db::repositories::{JobRepo, ScheduleRepo};
use parcelsync_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Tick resolution.
const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Background service that turns stored schedules into job submissions.
pub struct Scheduler {
    pool: DbPool,
}

impl Scheduler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run the tick loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        tracing::info!("Scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        tracing::error!(error = %e, "Scheduler tick failed");
                    }
                }
            }
        }
    }

    /// One tick: fire every due schedule.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let due = ScheduleRepo::list_due(&self.pool, now).await?;
        for schedule in due {
            if let Err(e) = self.fire(&schedule, now).await {
                tracing::error!(
                    schedule_id = schedule.id,
                    error = %e,
                    "Failed to fire schedule"
                );
            }
        }
        Ok(())
    }

    /// Fire one due schedule, or defer it when its last job still runs.
    async fn fire(&self, schedule: &SyncSchedule, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        // At most one active instance per schedule: an overrunning job
        // causes this firing to be skipped, not stacked.
        if let Some(last_job_id) = schedule.last_job_id {
            if let Some(last_job) = JobRepo::find_by_id(&self.pool, last_job_id).await? {
                if !state_machine::is_terminal(last_job.status_id) {
                    tracing::info!(
                        schedule_id = schedule.id,
                        last_job_id,
                        "Previous job still active; skipping this firing"
                    );
                    ScheduleRepo::defer(&self.pool, schedule.id, compute_next_run(schedule, now))
                        .await?;
                    return Ok(());
                }
            }
        }

        let job = JobRepo::submit(
            &self.pool,
            "scheduler",
            &SubmitJob {
                job_type: schedule.job_type.clone(),
                parameters: Some(schedule.parameters.clone()),
                idempotency_key: None,
            },
        )
        .await?;

        tracing::info!(
            schedule_id = schedule.id,
            job_id = job.id,
            job_type = %schedule.job_type,
            "Schedule fired"
        );

        ScheduleRepo::record_run(
            &self.pool,
            schedule.id,
            now,
            job.id,
            compute_next_run(schedule, now),
        )
        .await
    }
}

/// Next firing time for a schedule, computed from `from` (not from any
/// stale stored `next_run`, so a resumed or overrun schedule re-anchors
/// to the present).
pub fn compute_next_run(schedule: &SyncSchedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(expr) = &schedule.cron_expression {
        return match CronExpr::parse(expr) {
            Ok(parsed) => parsed.next_after(from),
            Err(e) => {
                tracing::error!(schedule_id = schedule.id, error = %e, "Bad cron expression");
                None
            }
        };
    }
    schedule
        .interval_hours
        .map(|hours| interval_next(from, i64::from(hours)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule(cron: Option<&str>, interval: Option<i32>) -> SyncSchedule {
        SyncSchedule {
            id: 1,
            name: "nightly".to_string(),
            job_type: "incremental_sync".to_string(),
            schedule_type: if cron.is_some() { "cron" } else { "interval" }.to_string(),
            cron_expression: cron.map(String::from),
            interval_hours: interval,
            parameters: serde_json::json!({}),
            is_active: true,
            last_run: None,
            next_run: None,
            last_job_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cron_schedule_advances_past_now() {
        let s = schedule(Some("0 2 * * *"), None);
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap();
        let next = compute_next_run(&s, now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 2, 0, 0).unwrap());
    }

    #[test]
    fn interval_schedule_anchors_to_from() {
        let s = schedule(None, Some(1));
        // Resume 90 minutes after the pause: next run is resume + 1h,
        // not the stale pause-time + 1h.
        let resumed_at = Utc.with_ymd_and_hms(2026, 3, 10, 13, 30, 0).unwrap();
        let next = compute_next_run(&s, resumed_at).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 10, 14, 30, 0).unwrap());
    }

    #[test]
    fn invalid_cron_yields_no_next_run() {
        let s = schedule(Some("not a cron"), None);
        assert!(compute_next_run(&s, Utc::now()).is_none());
    }
}
