//! Alert condition predicates evaluated after each quality report.

use serde::{Deserialize, Serialize};

use super::score::SeverityCounts;
use crate::severity::Severity;

/// Deserialized `conditions` payload of a quality alert.
///
/// Every present condition must hold for the alert to fire. An alert with
/// no conditions at all never fires (a misconfigured alert stays silent
/// rather than paging on every report).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConditions {
    /// Fire when at least this many open issues exist at or above the
    /// alert's severity threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_issues: Option<u64>,
    /// Fire when the overall score drops below this value. A report with
    /// no score (empty source set) does not satisfy this condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_overall_score: Option<f64>,
    /// Fire when at least this many anomalies were recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_anomalies: Option<u64>,
    /// Restrict to these tables; empty or absent means all tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
}

/// The per-report facts alert conditions are evaluated against.
#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub overall_score: Option<f64>,
    pub counts: SeverityCounts,
    pub anomalies: u64,
    pub tables: Vec<String>,
}

impl AlertConditions {
    /// Whether this alert fires for the given report.
    pub fn matches(&self, severity_threshold: Severity, summary: &ReportSummary) -> bool {
        if self.min_issues.is_none()
            && self.max_overall_score.is_none()
            && self.min_anomalies.is_none()
        {
            return false;
        }

        if let Some(tables) = &self.tables {
            if !tables.is_empty() && !tables.iter().any(|t| summary.tables.contains(t)) {
                return false;
            }
        }
        if let Some(min) = self.min_issues {
            if summary.counts.at_or_above(severity_threshold) < min {
                return false;
            }
        }
        if let Some(max_score) = self.max_overall_score {
            match summary.overall_score {
                Some(score) if score < max_score => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_anomalies {
            if summary.anomalies < min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(score: Option<f64>, errors: u64, anomalies: u64) -> ReportSummary {
        let mut counts = SeverityCounts::default();
        for _ in 0..errors {
            counts.add(Severity::Error);
        }
        ReportSummary {
            overall_score: score,
            counts,
            anomalies,
            tables: vec!["parcels".to_string()],
        }
    }

    #[test]
    fn empty_conditions_never_fire() {
        let conditions = AlertConditions::default();
        assert!(!conditions.matches(Severity::Info, &summary(Some(10.0), 50, 5)));
    }

    #[test]
    fn min_issues_respects_severity_threshold() {
        let conditions = AlertConditions {
            min_issues: Some(3),
            ..Default::default()
        };
        assert!(conditions.matches(Severity::Error, &summary(None, 3, 0)));
        assert!(!conditions.matches(Severity::Error, &summary(None, 2, 0)));
        // Errors do not count toward a critical threshold.
        assert!(!conditions.matches(Severity::Critical, &summary(None, 5, 0)));
    }

    #[test]
    fn max_overall_score_fires_below() {
        let conditions = AlertConditions {
            max_overall_score: Some(90.0),
            ..Default::default()
        };
        assert!(conditions.matches(Severity::Info, &summary(Some(85.0), 0, 0)));
        assert!(!conditions.matches(Severity::Info, &summary(Some(95.0), 0, 0)));
    }

    #[test]
    fn scoreless_report_does_not_satisfy_score_condition() {
        let conditions = AlertConditions {
            max_overall_score: Some(90.0),
            ..Default::default()
        };
        assert!(!conditions.matches(Severity::Info, &summary(None, 0, 0)));
    }

    #[test]
    fn table_restriction() {
        let conditions = AlertConditions {
            min_issues: Some(1),
            tables: Some(vec!["owners".to_string()]),
            ..Default::default()
        };
        assert!(!conditions.matches(Severity::Info, &summary(None, 5, 0)));
    }

    #[test]
    fn all_present_conditions_must_hold() {
        let conditions = AlertConditions {
            min_issues: Some(1),
            min_anomalies: Some(2),
            ..Default::default()
        };
        assert!(!conditions.matches(Severity::Info, &summary(None, 5, 1)));
        assert!(conditions.matches(Severity::Info, &summary(None, 5, 2)));
    }
}
