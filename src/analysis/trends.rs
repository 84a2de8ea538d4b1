//! Linear trend fitting over per-group time series.
//!
//! Heap groups contribute their in-use-space series, goroutine groups their
//! goroutine counts; other types carry no trend. A group needs at least
//! three files before a trend is fitted at all, and any non-finite input
//! short-circuits to a zero fit.

use super::grouping::ProfileGroup;
use crate::domain::ProfileKind;

/// Slope magnitude below which a series counts as stable, in units per
/// sample.
const DIRECTION_THRESHOLD: f64 = 0.01;

/// Minimum files in a group before trends are computed.
const MIN_TREND_SAMPLES: usize = 3;

/// Direction label derived from the fitted slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }

    /// Classify a slope against the stability threshold.
    #[must_use]
    pub fn from_slope(slope: f64) -> TrendDirection {
        if slope > DIRECTION_THRESHOLD {
            TrendDirection::Increasing
        } else if slope < -DIRECTION_THRESHOLD {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fitted linear trend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendMetrics {
    /// Units per sample (bytes for heap, goroutines for goroutine groups).
    pub slope: f64,
    /// Coefficient of determination, clamped to `[0, 1]`.
    pub r2: f64,
    pub direction: TrendDirection,
}

impl TrendMetrics {
    fn from_series(values: &[f64]) -> TrendMetrics {
        let (slope, r2) = linear_regression(values);
        TrendMetrics { slope, r2, direction: TrendDirection::from_slope(slope) }
    }
}

/// Trend data of one profile group; fields stay `None` for types without a
/// tracked series.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupTrends {
    pub heap_inuse: Option<TrendMetrics>,
    pub goroutine_count: Option<TrendMetrics>,
}

/// Fit trends for a group. Returns `None` below the sample floor; a group
/// of an untracked type still yields an (empty) `GroupTrends` so that
/// cross-analysis rules can see the type participated.
#[must_use]
pub fn calculate_trends(group: &ProfileGroup) -> Option<GroupTrends> {
    if group.files.len() < MIN_TREND_SAMPLES {
        return None;
    }

    let mut trends = GroupTrends::default();

    match group.kind {
        ProfileKind::Heap => {
            let values: Vec<f64> =
                group.files.iter().map(|file| file.metrics.inuse_space as f64).collect();
            if values.len() >= MIN_TREND_SAMPLES {
                trends.heap_inuse = Some(TrendMetrics::from_series(&values));
            }
        }
        ProfileKind::Goroutine => {
            let values: Vec<f64> =
                group.files.iter().map(|file| file.metrics.goroutine_count as f64).collect();
            if values.len() >= MIN_TREND_SAMPLES {
                trends.goroutine_count = Some(TrendMetrics::from_series(&values));
            }
        }
        _ => {}
    }

    Some(trends)
}

/// Least-squares fit of `values` against x = 0..n-1.
///
/// Returns `(slope, r2)`. Degenerate inputs (fewer than two points, zero
/// x-variance, any non-finite value) return `(0, 0)`; a perfectly constant
/// series has `r2 = 1` by definition.
#[must_use]
pub fn linear_regression(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.len() < 2 {
        return (0.0, 0.0);
    }
    if values.iter().any(|v| !v.is_finite()) {
        return (0.0, 0.0);
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let mean_x = sum_x / n;
    let mean_y = sum_y / n;
    if !mean_y.is_finite() {
        return (0.0, 0.0);
    }

    let denominator = sum_x2 - n * mean_x * mean_x;
    if denominator == 0.0 {
        return (0.0, 0.0);
    }
    let slope = (sum_xy - n * mean_x * mean_y) / denominator;
    if !slope.is_finite() {
        return (0.0, 0.0);
    }

    let intercept = mean_y - slope * mean_x;
    if !intercept.is_finite() {
        return (0.0, 0.0);
    }

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        if !predicted.is_finite() {
            return (0.0, 0.0);
        }
        ss_res += (y - predicted) * (y - predicted);
        ss_tot += (y - mean_y) * (y - mean_y);
    }
    if !ss_res.is_finite() || !ss_tot.is_finite() {
        return (0.0, 0.0);
    }

    let mut r2 = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };
    if !r2.is_finite() {
        r2 = 0.0;
    }
    (slope, r2.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::grouping::ProfileFile;
    use crate::analysis::metrics::ProfileMetrics;
    use crate::pprof::Profile;
    use chrono::DateTime;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn heap_group(inuse: &[i64]) -> ProfileGroup {
        let files = inuse
            .iter()
            .enumerate()
            .map(|(i, &space)| ProfileFile {
                path: PathBuf::from(format!("heap{i}.pprof")),
                time: DateTime::from_timestamp(60 * i as i64, 0).unwrap(),
                size: 0,
                profile: Arc::new(Profile::default()),
                metrics: ProfileMetrics { inuse_space: space, ..ProfileMetrics::default() },
            })
            .collect();
        ProfileGroup { kind: ProfileKind::Heap, files }
    }

    #[test]
    fn test_perfect_line() {
        // y = 2x + 1
        let (slope, r2) = linear_regression(&[1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!((slope - 2.0).abs() < 1e-3);
        assert!((r2 - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_values() {
        let (slope, r2) = linear_regression(&[5.0, 5.0, 5.0, 5.0]);
        assert!((slope).abs() < 1e-9);
        assert!((r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_points() {
        let (slope, r2) = linear_regression(&[0.0, 10.0]);
        assert!((slope - 10.0).abs() < 1e-9);
        assert!((r2 - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(linear_regression(&[]), (0.0, 0.0));
        assert_eq!(linear_regression(&[5.0]), (0.0, 0.0));
    }

    #[test]
    fn test_non_finite_inputs() {
        assert_eq!(linear_regression(&[1.0, f64::NAN, 3.0]), (0.0, 0.0));
        assert_eq!(linear_regression(&[1.0, f64::INFINITY, 3.0]), (0.0, 0.0));
        assert_eq!(linear_regression(&[1.0, f64::NEG_INFINITY, 3.0]), (0.0, 0.0));
    }

    #[test]
    fn test_decreasing_trend() {
        // y = -3x + 10
        let (slope, r2) = linear_regression(&[10.0, 7.0, 4.0, 1.0]);
        assert!((slope + 3.0).abs() < 1e-3);
        assert!((r2 - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_noisy_data_r2_in_bounds() {
        let (slope, r2) = linear_regression(&[1.1, 2.9, 5.2, 6.8, 9.1]);
        assert!(slope > 1.5);
        assert!(r2 > 0.9);
        assert!(r2 <= 1.0);
    }

    #[test]
    fn test_r2_bounds_over_generated_series() {
        // A light sweep instead of a quickcheck dependency: varied shapes
        // must all land in [0, 1].
        let cases: Vec<Vec<f64>> = vec![
            vec![0.0, 0.0, 1e12],
            vec![-5.0, 5.0, -5.0, 5.0],
            vec![1e-9, 2e-9, 3e-9],
            (0..50).map(|i| ((i * 7919) % 97) as f64).collect(),
        ];
        for values in cases {
            let (_, r2) = linear_regression(&values);
            assert!((0.0..=1.0).contains(&r2), "r2 out of range for {values:?}");
        }
    }

    #[test]
    fn test_direction_thresholds() {
        assert_eq!(TrendDirection::from_slope(1.0), TrendDirection::Increasing);
        assert_eq!(TrendDirection::from_slope(0.02), TrendDirection::Increasing);
        assert_eq!(TrendDirection::from_slope(0.005), TrendDirection::Stable);
        assert_eq!(TrendDirection::from_slope(0.0), TrendDirection::Stable);
        assert_eq!(TrendDirection::from_slope(-0.005), TrendDirection::Stable);
        assert_eq!(TrendDirection::from_slope(-0.02), TrendDirection::Decreasing);
        assert_eq!(TrendDirection::from_slope(-1.0), TrendDirection::Decreasing);
    }

    #[test]
    fn test_trends_require_three_files() {
        assert!(calculate_trends(&heap_group(&[100, 200])).is_none());
        assert!(calculate_trends(&heap_group(&[])).is_none());
    }

    #[test]
    fn test_heap_trend_increasing() {
        let mb = 1024 * 1024;
        let trends = calculate_trends(&heap_group(&[100 * mb, 200 * mb, 300 * mb])).unwrap();
        let heap = trends.heap_inuse.unwrap();
        assert!(heap.slope > 0.0);
        assert!((heap.r2 - 1.0).abs() < 1e-6);
        assert_eq!(heap.direction, TrendDirection::Increasing);
        assert!(trends.goroutine_count.is_none());
    }

    #[test]
    fn test_untracked_type_still_participates() {
        let files = (0..3)
            .map(|i| ProfileFile {
                path: PathBuf::from(format!("cpu{i}.pprof")),
                time: DateTime::from_timestamp(i, 0).unwrap(),
                size: 0,
                profile: Arc::new(Profile::default()),
                metrics: ProfileMetrics::default(),
            })
            .collect();
        let group = ProfileGroup { kind: ProfileKind::Cpu, files };

        let trends = calculate_trends(&group).unwrap();
        assert!(trends.heap_inuse.is_none());
        assert!(trends.goroutine_count.is_none());
    }
}
