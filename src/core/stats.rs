use super::error::{Result, RiskError};
use super::types::Percentiles;

/// Terminal values of every simulated path, sorted ascending.
#[derive(Debug, Clone)]
pub struct OutcomeDistribution {
    sorted: Vec<f64>,
    initial_value: f64,
    target_return: f64,
}

impl OutcomeDistribution {
    pub fn new(mut final_values: Vec<f64>, initial_value: f64, target_return: f64) -> Result<Self> {
        if final_values.is_empty() {
            return Err(RiskError::empty_data("outcome distribution"));
        }
        if !initial_value.is_finite() || initial_value <= 0.0 {
            return Err(RiskError::invalid_parameter("initial_value must be > 0"));
        }

        final_values.sort_by(|a, b| a.total_cmp(b));
        Ok(Self {
            sorted: final_values,
            initial_value,
            target_return,
        })
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn sorted(&self) -> &[f64] {
        &self.sorted
    }

    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }

    /// Nearest-order-statistic percentile, `p` in `[0, 1]`.
    pub fn percentile(&self, p: f64) -> f64 {
        nearest_rank_percentile(&self.sorted, p)
    }

    pub fn percentiles(&self) -> Percentiles {
        percentile_bands(&self.sorted)
    }

    pub fn probability_of_loss(&self) -> f64 {
        let losses = self
            .sorted
            .iter()
            .filter(|&&v| v < self.initial_value)
            .count();
        losses as f64 / self.len() as f64
    }

    pub fn probability_of_target(&self) -> f64 {
        let threshold = self.initial_value * (1.0 + self.target_return / 100.0);
        let hits = self.sorted.iter().filter(|&&v| v >= threshold).count();
        hits as f64 / self.len() as f64
    }

    pub fn expected_value(&self) -> f64 {
        self.sorted.iter().sum::<f64>() / self.len() as f64
    }

    /// Population standard deviation (divisor `n`).
    pub fn std_dev(&self) -> f64 {
        let mean = self.expected_value();
        let var = self
            .sorted
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.len() as f64;
        var.sqrt()
    }

    pub fn volatility_of_outcomes(&self) -> f64 {
        self.std_dev() / self.initial_value * 100.0
    }

    pub fn expected_return_pct(&self) -> f64 {
        (self.expected_value() / self.initial_value - 1.0) * 100.0
    }
}

/// `sorted[floor(p * n)]`, clamped to the last element. No interpolation
/// between adjacent order statistics; biased for small `n`.
pub fn nearest_rank_percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let n = sorted.len();
    let rank = (p.max(0.0) * n as f64).floor() as usize;
    sorted[rank.min(n - 1)]
}

pub fn percentile_bands(sorted: &[f64]) -> Percentiles {
    Percentiles {
        p5: nearest_rank_percentile(sorted, 0.05),
        p25: nearest_rank_percentile(sorted, 0.25),
        p50: nearest_rank_percentile(sorted, 0.50),
        p75: nearest_rank_percentile(sorted, 0.75),
        p95: nearest_rank_percentile(sorted, 0.95),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn one_to_ten() -> OutcomeDistribution {
        let values = (1..=10).rev().map(|v| v as f64).collect();
        OutcomeDistribution::new(values, 5.0, 60.0).expect("valid distribution")
    }

    #[test]
    fn percentile_uses_floor_rank_without_interpolation() {
        let dist = one_to_ten();
        assert_approx(dist.percentile(0.05), 1.0);
        assert_approx(dist.percentile(0.25), 3.0);
        assert_approx(dist.percentile(0.5), 6.0);
        assert_approx(dist.percentile(0.95), 10.0);
        assert_approx(dist.percentile(1.0), 10.0);
    }

    #[test]
    fn probabilities_count_strict_loss_and_inclusive_target() {
        let dist = one_to_ten();
        // loss: 1..=4 below 5; target: >= 8
        assert_approx(dist.probability_of_loss(), 0.4);
        assert_approx(dist.probability_of_target(), 0.3);
    }

    #[test]
    fn population_std_dev_divides_by_n() {
        let dist = OutcomeDistribution::new(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 10.0, 0.0)
            .expect("valid distribution");
        assert_approx(dist.expected_value(), 5.0);
        assert_approx(dist.std_dev(), 2.0);
        assert_approx(dist.volatility_of_outcomes(), 20.0);
        assert_approx(dist.expected_return_pct(), -50.0);
    }

    #[test]
    fn single_outcome_is_degenerate_not_an_error() {
        let dist = OutcomeDistribution::new(vec![123.0], 100.0, 10.0).expect("valid distribution");
        let p = dist.percentiles();
        for v in [p.p5, p.p25, p.p50, p.p75, p.p95] {
            assert_approx(v, 123.0);
        }
        assert_approx(dist.std_dev(), 0.0);
        assert_approx(dist.probability_of_loss(), 0.0);
        assert_approx(dist.probability_of_target(), 1.0);
    }

    #[test]
    fn empty_outcomes_are_rejected() {
        let err = OutcomeDistribution::new(Vec::new(), 100.0, 0.0).expect_err("must reject");
        assert!(matches!(err, RiskError::EmptyData { .. }));
    }

    #[test]
    fn negative_outcomes_are_tolerated() {
        let dist = OutcomeDistribution::new(vec![-50.0, 10.0, 200.0], 100.0, 0.0)
            .expect("valid distribution");
        assert_approx(dist.percentile(0.0), -50.0);
        assert!(dist.std_dev().is_finite());
        assert_approx(dist.probability_of_loss(), 2.0 / 3.0);
    }
}
