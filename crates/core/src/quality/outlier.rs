//! Statistical outlier detection over a column's sampled distribution.

use serde::{Deserialize, Serialize};

/// Detection method for `statistical_outlier` rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    ZScore,
    Iqr,
}

impl std::str::FromStr for OutlierMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zscore" => Ok(Self::ZScore),
            "iqr" => Ok(Self::Iqr),
            other => Err(format!("Unknown outlier method: {other}")),
        }
    }
}

/// One detected outlier: the index into the sampled values and the
/// z-score (zscore method) or fence distance in IQR units (iqr method).
#[derive(Debug, Clone, PartialEq)]
pub struct Outlier {
    pub index: usize,
    pub score: f64,
}

/// Detect outliers in a sampled distribution.
///
/// Fewer than four samples never yields outliers — the statistics are
/// meaningless at that size.
pub fn detect(values: &[f64], method: OutlierMethod, threshold: f64) -> Vec<Outlier> {
    if values.len() < 4 {
        return Vec::new();
    }
    match method {
        OutlierMethod::ZScore => detect_zscore(values, threshold),
        OutlierMethod::Iqr => detect_iqr(values, threshold),
    }
}

fn detect_zscore(values: &[f64], threshold: f64) -> Vec<Outlier> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter_map(|(index, v)| {
            let z = (v - mean) / std_dev;
            if z.abs() > threshold {
                Some(Outlier { index, score: z })
            } else {
                None
            }
        })
        .collect()
}

fn detect_iqr(values: &[f64], threshold: f64) -> Vec<Outlier> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q1 = percentile(&sorted, 0.25);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;
    if iqr == 0.0 {
        return Vec::new();
    }
    let lower = q1 - threshold * iqr;
    let upper = q3 + threshold * iqr;
    values
        .iter()
        .enumerate()
        .filter_map(|(index, v)| {
            if *v < lower {
                Some(Outlier {
                    index,
                    score: (lower - v) / iqr,
                })
            } else if *v > upper {
                Some(Outlier {
                    index,
                    score: (v - upper) / iqr,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Linear-interpolated percentile over a sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_outliers_in_uniform_data() {
        let values = [10.0, 11.0, 10.5, 10.2, 10.8, 10.4];
        assert!(detect(&values, OutlierMethod::ZScore, 3.0).is_empty());
        assert!(detect(&values, OutlierMethod::Iqr, 1.5).is_empty());
    }

    #[test]
    fn zscore_flags_extreme_value() {
        let mut values = vec![100.0; 30];
        values.push(100_000.0);
        let outliers = detect(&values, OutlierMethod::ZScore, 3.0);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].index, 30);
        assert!(outliers[0].score > 3.0);
    }

    #[test]
    fn iqr_flags_extreme_value() {
        let values = [1.0, 2.0, 2.5, 3.0, 3.5, 4.0, 50.0];
        let outliers = detect(&values, OutlierMethod::Iqr, 1.5);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].index, 6);
    }

    #[test]
    fn negative_outlier_has_positive_iqr_distance() {
        let values = [10.0, 11.0, 12.0, 13.0, 14.0, -100.0];
        let outliers = detect(&values, OutlierMethod::Iqr, 1.5);
        assert_eq!(outliers.len(), 1);
        assert!(outliers[0].score > 0.0);
    }

    #[test]
    fn constant_distribution_has_no_outliers() {
        let values = [5.0; 20];
        assert!(detect(&values, OutlierMethod::ZScore, 1.0).is_empty());
        assert!(detect(&values, OutlierMethod::Iqr, 1.0).is_empty());
    }

    #[test]
    fn tiny_samples_are_skipped() {
        let values = [1.0, 2.0, 1000.0];
        assert!(detect(&values, OutlierMethod::ZScore, 1.0).is_empty());
    }
}
