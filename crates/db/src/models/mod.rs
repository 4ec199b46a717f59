//! Row models and DTOs for the application database.

pub mod alert;
pub mod anomaly;
pub mod issue;
pub mod job;
pub mod job_log;
pub mod notification;
pub mod quality_rule;
pub mod report;
pub mod sanitization_rule;
pub mod schedule;
pub mod status;
pub mod table_config;
