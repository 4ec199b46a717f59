//! Engine configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for batch sizing, retries, timeouts, and exports.
///
/// All fields have defaults suitable for local development; override via
/// environment variables in production.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rows per batch; a batch is the unit of atomic watermark advance.
    pub batch_size: i64,
    /// Write attempts per batch before the job fails (first try included).
    pub max_write_attempts: u32,
    /// Base delay for exponential backoff between write attempts.
    pub retry_base: Duration,
    /// Per-job deadline; exceeding it fails the job with `timeout_exceeded`.
    pub job_timeout: Duration,
    /// Per-batch deadline.
    pub batch_timeout: Duration,
    /// Jobs that may execute concurrently (distinct job types only).
    pub max_concurrent_jobs: usize,
    /// Row ceiling above which quality reports sample instead of streaming
    /// the whole table.
    pub report_sample_ceiling: i64,
    /// Directory property exports are written into.
    pub export_dir: PathBuf,
    /// HMAC key for the deterministic `hash`/`tokenize` sanitization
    /// strategies. Stable across jobs so re-sanitized values compare equal
    /// and incremental re-runs stay write-free.
    pub sanitize_key: String,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default        |
    /// |------------------------------|----------------|
    /// | `SYNC_BATCH_SIZE`            | `1000`         |
    /// | `SYNC_MAX_WRITE_ATTEMPTS`    | `5`            |
    /// | `SYNC_RETRY_BASE_MS`         | `1000`         |
    /// | `SYNC_JOB_TIMEOUT_SECS`      | `21600` (6 h)  |
    /// | `SYNC_BATCH_TIMEOUT_SECS`    | `300`          |
    /// | `SYNC_MAX_CONCURRENT_JOBS`   | `4`            |
    /// | `QUALITY_SAMPLE_CEILING`     | `50000`        |
    /// | `EXPORT_DIR`                 | `./exports`    |
    /// | `SANITIZE_KEY`               | `parcelsync-sanitize` |
    pub fn from_env() -> Self {
        Self {
            batch_size: env_parse("SYNC_BATCH_SIZE", 1000),
            max_write_attempts: env_parse("SYNC_MAX_WRITE_ATTEMPTS", 5),
            retry_base: Duration::from_millis(env_parse("SYNC_RETRY_BASE_MS", 1000)),
            job_timeout: Duration::from_secs(env_parse("SYNC_JOB_TIMEOUT_SECS", 21_600)),
            batch_timeout: Duration::from_secs(env_parse("SYNC_BATCH_TIMEOUT_SECS", 300)),
            max_concurrent_jobs: env_parse("SYNC_MAX_CONCURRENT_JOBS", 4),
            report_sample_ceiling: env_parse("QUALITY_SAMPLE_CEILING", 50_000),
            export_dir: PathBuf::from(
                std::env::var("EXPORT_DIR").unwrap_or_else(|_| "./exports".to_string()),
            ),
            sanitize_key: std::env::var("SANITIZE_KEY")
                .unwrap_or_else(|_| "parcelsync-sanitize".to_string()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        // Defaults only; no environment reads in tests.
        Self {
            batch_size: 1000,
            max_write_attempts: 5,
            retry_base: Duration::from_secs(1),
            job_timeout: Duration::from_secs(21_600),
            batch_timeout: Duration::from_secs(300),
            max_concurrent_jobs: 4,
            report_sample_ceiling: 50_000,
            export_dir: PathBuf::from("./exports"),
            sanitize_key: "parcelsync-sanitize".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
