//! Pure domain logic for the parcelsync engine.
//!
//! This crate has zero internal dependencies so it can be used by the
//! repository layer, the sync engine, the notification router, and any
//! future CLI tooling:
//!
//! - [`handlers`] — per-column-type value handlers (geometry, JSON,
//!   document reference, datetime, array, scalar) and the registry that
//!   resolves a handler from a declared type tag.
//! - [`sanitize`] — PII sanitization strategies applied on down-sync.
//! - [`quality`] — data-quality rule evaluation, scoring, outlier
//!   detection, sandboxed expressions, and alert conditions.
//! - [`diff`] — field-level row diff planning.
//! - [`cron`] — cron/interval schedule math for the scheduler.
//! - [`jobs`] — job and issue state machines.

pub mod cron;
pub mod diff;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod quality;
pub mod sanitize;
pub mod severity;
pub mod types;

pub use error::CoreError;
pub use severity::Severity;
