use rayon::prelude::*;

use super::engine::PathMatrix;
use super::error::{Result, RiskError};
use super::stats::percentile_bands;
use super::types::{FanPoint, HistogramBucket};

fn return_pct(value: f64, initial_value: f64) -> f64 {
    (value - initial_value) / initial_value * 100.0
}

/// Equal-width histogram of terminal percent returns over `[min, max]`.
///
/// Buckets are half-open `[start, end)` except the last, which also holds the
/// maximum. When every return is identical all outcomes land in the last
/// bucket and each range has zero width.
pub fn build_histogram(
    final_values: &[f64],
    initial_value: f64,
    bucket_count: usize,
) -> Result<Vec<HistogramBucket>> {
    if bucket_count == 0 {
        return Err(RiskError::invalid_parameter("bucket_count must be > 0"));
    }
    if final_values.is_empty() {
        return Err(RiskError::empty_data("histogram"));
    }
    if !initial_value.is_finite() || initial_value <= 0.0 {
        return Err(RiskError::invalid_parameter("initial_value must be > 0"));
    }

    let returns: Vec<f64> = final_values
        .iter()
        .map(|&v| return_pct(v, initial_value))
        .collect();
    let min = returns.iter().copied().fold(f64::INFINITY, f64::min);
    let max = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / bucket_count as f64;

    let last = bucket_count - 1;
    let edges: Vec<f64> = (0..=bucket_count)
        .map(|i| {
            if i == bucket_count {
                max
            } else {
                min + width * i as f64
            }
        })
        .collect();

    let mut counts = vec![0_usize; bucket_count];
    for &r in &returns {
        let mut idx = if width > 0.0 {
            (((r - min) / width).floor() as usize).min(last)
        } else {
            last
        };
        // Settle against the stored edges so counts agree with reported ranges.
        while idx > 0 && r < edges[idx] {
            idx -= 1;
        }
        while idx < last && r >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }

    let n = returns.len() as f64;
    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let (range_start, range_end) = (edges[i], edges[i + 1]);
            HistogramBucket {
                range_start,
                range_end,
                midpoint: (range_start + range_end) / 2.0,
                count,
                frequency: count as f64 / n,
            }
        })
        .collect())
}

/// Percentile bands of percent return at every time step, in chronological order.
pub fn build_fan_chart(paths: &PathMatrix, initial_value: f64) -> Vec<FanPoint> {
    (0..paths.num_points())
        .into_par_iter()
        .map(|month| {
            let mut returns: Vec<f64> = paths
                .column(month)
                .map(|v| return_pct(v, initial_value))
                .collect();
            returns.sort_by(|a, b| a.total_cmp(b));
            FanPoint {
                month,
                percentiles: percentile_bands(&returns),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn histogram_places_max_in_last_bucket() {
        // returns: -10, 0, 10, 20, 30
        let values = [90.0, 100.0, 110.0, 120.0, 130.0];
        let buckets = build_histogram(&values, 100.0, 4).expect("valid histogram");

        assert_eq!(buckets.len(), 4);
        let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 2]);
        assert_approx(buckets[0].range_start, -10.0);
        assert_approx(buckets[0].range_end, 0.0);
        assert_approx(buckets[0].midpoint, -5.0);
        assert_approx(buckets[3].range_end, 30.0);
        assert_approx(buckets[3].frequency, 0.4);
    }

    #[test]
    fn degenerate_histogram_keeps_bucket_count_and_all_outcomes() {
        let values = [100.0; 12];
        let buckets = build_histogram(&values, 100.0, 8).expect("valid histogram");

        assert_eq!(buckets.len(), 8);
        assert_eq!(buckets[7].count, 12);
        assert_approx(buckets[7].frequency, 1.0);
        for b in &buckets {
            assert_approx(b.range_start, 0.0);
            assert_approx(b.range_end, 0.0);
        }
    }

    #[test]
    fn histogram_rejects_zero_buckets() {
        let err = build_histogram(&[1.0], 1.0, 0).expect_err("must reject");
        assert!(err.to_string().contains("bucket_count"));
    }

    #[test]
    fn fan_chart_reports_percent_returns_per_step() {
        let paths = PathMatrix::from_rows(&[
            vec![100.0, 90.0, 80.0],
            vec![100.0, 110.0, 120.0],
            vec![100.0, 100.0, 150.0],
        ]);
        let fan = build_fan_chart(&paths, 100.0);

        assert_eq!(fan.len(), 3);
        assert_eq!(fan[0].month, 0);
        assert_approx(fan[0].percentiles.p5, 0.0);
        assert_approx(fan[0].percentiles.p95, 0.0);
        assert_approx(fan[1].percentiles.p5, -10.0);
        assert_approx(fan[1].percentiles.p50, 0.0);
        assert_approx(fan[2].percentiles.p95, 50.0);
        assert_eq!(fan[2].month, 2);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_histogram_counts_sum_to_outcomes(
            values in vec(-1_000.0f64..5_000.0, 1..500),
            buckets in 1usize..40,
        ) {
            let hist = build_histogram(&values, 1_000.0, buckets).expect("valid histogram");
            prop_assert_eq!(hist.len(), buckets);
            prop_assert_eq!(hist.iter().map(|b| b.count).sum::<usize>(), values.len());
            let freq: f64 = hist.iter().map(|b| b.frequency).sum();
            prop_assert!((freq - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_histogram_counts_match_reported_ranges(
            values in vec(-1_000.0f64..5_000.0, 1..300),
            buckets in 1usize..40,
        ) {
            let hist = build_histogram(&values, 1_000.0, buckets).expect("valid histogram");
            let returns: Vec<f64> = values.iter().map(|&v| return_pct(v, 1_000.0)).collect();
            for (i, b) in hist.iter().enumerate() {
                let last = i + 1 == hist.len();
                let inside = returns
                    .iter()
                    .filter(|&&r| r >= b.range_start && (r < b.range_end || (last && r <= b.range_end)))
                    .count();
                prop_assert_eq!(inside, b.count, "bucket {}", i);
            }
        }
    }
}
