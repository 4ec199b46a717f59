//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod alert_repo;
pub mod anomaly_repo;
pub mod audit_repo;
pub mod issue_repo;
pub mod job_log_repo;
pub mod job_repo;
pub mod notification_repo;
pub mod quality_rule_repo;
pub mod report_repo;
pub mod sanitization_rule_repo;
pub mod schedule_repo;
pub mod table_config_repo;

pub use alert_repo::AlertRepo;
pub use anomaly_repo::AnomalyRepo;
pub use audit_repo::AuditRepo;
pub use issue_repo::IssueRepo;
pub use job_log_repo::JobLogRepo;
pub use job_repo::JobRepo;
pub use notification_repo::NotificationRepo;
pub use quality_rule_repo::QualityRuleRepo;
pub use report_repo::ReportRepo;
pub use sanitization_rule_repo::SanitizationRuleRepo;
pub use schedule_repo::ScheduleRepo;
pub use table_config_repo::TableConfigRepo;
