//! Engine error type and the operator-facing error taxonomy.

use parcelsync_core::CoreError;

/// Error kind strings recorded on failed jobs, issues, and logs.
/// These are the operator-facing taxonomy, not Rust type names.
pub mod error_kind {
    pub const CONFIG_INVALID: &str = "config_invalid";
    pub const SOURCE_UNAVAILABLE: &str = "source_unavailable";
    pub const TARGET_UNAVAILABLE: &str = "target_unavailable";
    pub const CONSTRAINT_VIOLATION: &str = "constraint_violation";
    pub const TYPE_MISMATCH: &str = "type_mismatch";
    pub const SANITIZATION_ERROR: &str = "sanitization_error";
    pub const CRITICAL_VALIDATION: &str = "critical_validation";
    pub const ALREADY_RUNNING: &str = "already_running";
    pub const TIMEOUT_EXCEEDED: &str = "timeout_exceeded";
    pub const CANCELLED_BY_USER: &str = "cancelled_by_user";
}

/// Engine-level error type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid job configuration: {0}")]
    Config(String),

    #[error("A {0} job is already running")]
    AlreadyRunning(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether a database error is worth retrying with backoff.
///
/// Connection-level failures and deadlocks are transient; constraint and
/// data errors are not.
pub fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db) => {
            // 40001 serialization_failure, 40P01 deadlock_detected,
            // 57P01 admin_shutdown, 08xxx connection exceptions.
            matches!(
                db.code().as_deref(),
                Some("40001") | Some("40P01") | Some("57P01")
            ) || db.code().as_deref().is_some_and(|c| c.starts_with("08"))
        }
        _ => false,
    }
}

/// Whether a database error is a target-side constraint rejection
/// (FK, check, unique, not-null).
pub fn is_constraint_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db
            .code()
            .as_deref()
            .is_some_and(|c| c.starts_with("23")),
        _ => false,
    }
}
