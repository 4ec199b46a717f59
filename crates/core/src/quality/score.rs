//! Severity-weighted quality scoring.
//!
//! `table_score = max(0, 100 - 100 * issues_weighted / rows_checked)`;
//! the overall score is the mean of table scores weighted by rows checked.
//! Tables with zero rows checked have no score and are excluded from the
//! overall mean — no hard-coded defaults stand in for missing data.

use serde::{Deserialize, Serialize};

use crate::severity::Severity;

// ---------------------------------------------------------------------------
// Severity counts
// ---------------------------------------------------------------------------

/// Open-issue counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: u64,
    pub warning: u64,
    pub error: u64,
    pub critical: u64,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
            Severity::Error => self.error += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.info + self.warning + self.error + self.critical
    }

    /// Count of issues at or above the given severity.
    pub fn at_or_above(&self, threshold: Severity) -> u64 {
        Severity::ALL
            .iter()
            .filter(|s| **s >= threshold)
            .map(|s| match s {
                Severity::Info => self.info,
                Severity::Warning => self.warning,
                Severity::Error => self.error,
                Severity::Critical => self.critical,
            })
            .sum()
    }

    /// Severity-weighted issue total.
    pub fn weighted(&self) -> f64 {
        self.info as f64 * Severity::Info.weight()
            + self.warning as f64 * Severity::Warning.weight()
            + self.error as f64 * Severity::Error.weight()
            + self.critical as f64 * Severity::Critical.weight()
    }
}

// ---------------------------------------------------------------------------
// Dimension tallies
// ---------------------------------------------------------------------------

/// Pass/fail tally for one sub-score dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionTally {
    pub checks: u64,
    pub failures: u64,
}

impl DimensionTally {
    pub fn record(&mut self, failed: bool) {
        self.checks += 1;
        if failed {
            self.failures += 1;
        }
    }

    /// Pass rate as a 0-100 score, or `None` when nothing was checked.
    pub fn rate(&self) -> Option<f64> {
        if self.checks == 0 {
            None
        } else {
            Some(100.0 * (self.checks - self.failures) as f64 / self.checks as f64)
        }
    }
}

// ---------------------------------------------------------------------------
// Table and overall scores
// ---------------------------------------------------------------------------

/// Quality breakdown for one table within a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableScore {
    pub table: String,
    pub rows_checked: u64,
    pub counts: SeverityCounts,
    pub score: Option<f64>,
    /// Share of required fields present and non-null.
    pub completeness: Option<f64>,
    /// Pass rate of value-shape rules (range, regex, enum).
    pub accuracy: Option<f64>,
    /// Pass rate of referential and cross-field rules.
    pub consistency: Option<f64>,
}

/// `max(0, 100 - 100 * weighted / rows)`, or `None` for an empty table.
pub fn table_score(rows_checked: u64, issues_weighted: f64) -> Option<f64> {
    if rows_checked == 0 {
        return None;
    }
    Some((100.0 - 100.0 * issues_weighted / rows_checked as f64).max(0.0))
}

/// Rows-weighted mean of table scores. Tables without a score (zero rows)
/// are excluded; `None` when no table has a score.
pub fn overall_score(tables: &[TableScore]) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut total_rows = 0u64;
    for t in tables {
        if let Some(score) = t.score {
            weighted_sum += score * t.rows_checked as f64;
            total_rows += t.rows_checked;
        }
    }
    if total_rows == 0 {
        None
    } else {
        Some(weighted_sum / total_rows as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, rows: u64, score: Option<f64>) -> TableScore {
        TableScore {
            table: name.to_string(),
            rows_checked: rows,
            counts: SeverityCounts::default(),
            score,
            completeness: None,
            accuracy: None,
            consistency: None,
        }
    }

    #[test]
    fn perfect_table_scores_100() {
        assert_eq!(table_score(500, 0.0), Some(100.0));
    }

    #[test]
    fn score_is_clamped_at_zero() {
        // 10 rows, weighted issues 20 -> 100 - 200 = -100 -> clamped.
        assert_eq!(table_score(10, 20.0), Some(0.0));
    }

    #[test]
    fn empty_table_has_no_score() {
        assert_eq!(table_score(0, 0.0), None);
    }

    #[test]
    fn score_within_bounds() {
        for (rows, weighted) in [(100, 3.0), (1000, 310.0), (7, 1.0)] {
            let s = table_score(rows, weighted).unwrap();
            assert!((0.0..=100.0).contains(&s), "score {s} out of bounds");
        }
    }

    #[test]
    fn overall_is_rows_weighted_mean() {
        let tables = [table("a", 100, Some(90.0)), table("b", 300, Some(100.0))];
        let overall = overall_score(&tables).unwrap();
        // (90*100 + 100*300) / 400 = 97.5
        assert!((overall - 97.5).abs() < 1e-9);
    }

    #[test]
    fn empty_tables_excluded_from_overall() {
        let tables = [table("a", 100, Some(80.0)), table("b", 0, None)];
        assert_eq!(overall_score(&tables), Some(80.0));
    }

    #[test]
    fn all_empty_means_no_overall() {
        let tables = [table("a", 0, None)];
        assert_eq!(overall_score(&tables), None);
    }

    #[test]
    fn weighted_counts() {
        let mut counts = SeverityCounts::default();
        counts.add(Severity::Info);
        counts.add(Severity::Warning);
        counts.add(Severity::Error);
        counts.add(Severity::Critical);
        assert_eq!(counts.weighted(), 1.0 + 3.0 + 10.0 + 30.0);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn at_or_above_threshold() {
        let mut counts = SeverityCounts::default();
        counts.add(Severity::Info);
        counts.add(Severity::Error);
        counts.add(Severity::Critical);
        assert_eq!(counts.at_or_above(Severity::Error), 2);
        assert_eq!(counts.at_or_above(Severity::Info), 3);
    }

    #[test]
    fn dimension_rate() {
        let mut tally = DimensionTally::default();
        assert_eq!(tally.rate(), None);
        tally.record(false);
        tally.record(false);
        tally.record(true);
        assert!((tally.rate().unwrap() - 66.666).abs() < 0.01);
    }
}
