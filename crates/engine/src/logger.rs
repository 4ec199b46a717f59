//! Buffered per-job logging.
//!
//! `append_log` must be non-blocking from the engine's perspective, so
//! entries go through an unbounded channel to a background task that
//! flushes them in batches. There is no crash-consistency requirement for
//! the log tail.

use std::time::Duration;

use parcelsync_core::severity::LogLevel;
use parcelsync_core::types::DbId;
use parcelsync_db::models::job_log::NewJobLog;
use parcelsync_db::repositories::JobLogRepo;
use parcelsync_db::DbPool;
use tokio::sync::mpsc;

/// Flush whenever this many entries are buffered.
const FLUSH_BATCH: usize = 64;

/// Flush at least this often while entries trickle in.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Handle for appending log entries to one job's log.
#[derive(Clone)]
pub struct JobLogger {
    job_id: DbId,
    sender: mpsc::UnboundedSender<NewJobLog>,
}

impl JobLogger {
    /// Start a logger and its background flush task.
    pub fn start(pool: DbPool, job_id: DbId) -> (Self, tokio::task::JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(flush_loop(pool, receiver));
        (Self { job_id, sender }, handle)
    }

    /// Queue one log entry. Never blocks; entries are dropped only if the
    /// flush task has already terminated.
    pub fn log(
        &self,
        level: LogLevel,
        table: Option<&str>,
        record_id: Option<&str>,
        message: impl Into<String>,
    ) {
        let entry = NewJobLog {
            job_id: self.job_id,
            level,
            table_name: table.map(String::from),
            record_id: record_id.map(String::from),
            message: message.into(),
        };
        if self.sender.send(entry).is_err() {
            tracing::warn!(job_id = self.job_id, "Job log channel closed; entry dropped");
        }
    }

    pub fn info(&self, table: Option<&str>, message: impl Into<String>) {
        self.log(LogLevel::Info, table, None, message);
    }

    pub fn warning(&self, table: Option<&str>, message: impl Into<String>) {
        self.log(LogLevel::Warning, table, None, message);
    }

    pub fn error(&self, table: Option<&str>, record_id: Option<&str>, message: impl Into<String>) {
        self.log(LogLevel::Error, table, record_id, message);
    }
}

/// Drain the channel, writing batches until the sender side is dropped.
async fn flush_loop(pool: DbPool, mut receiver: mpsc::UnboundedReceiver<NewJobLog>) {
    let mut buffer: Vec<NewJobLog> = Vec::with_capacity(FLUSH_BATCH);
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            received = receiver.recv() => {
                match received {
                    Some(entry) => {
                        buffer.push(entry);
                        if buffer.len() >= FLUSH_BATCH {
                            flush(&pool, &mut buffer).await;
                        }
                    }
                    None => {
                        flush(&pool, &mut buffer).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&pool, &mut buffer).await;
            }
        }
    }
}

async fn flush(pool: &DbPool, buffer: &mut Vec<NewJobLog>) {
    if buffer.is_empty() {
        return;
    }
    if let Err(e) = JobLogRepo::append_batch(pool, buffer).await {
        tracing::error!(error = %e, entries = buffer.len(), "Failed to flush job logs");
    }
    buffer.clear();
}
