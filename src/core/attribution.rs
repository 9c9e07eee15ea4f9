//! Per-holding decomposition of a portfolio VaR figure.
//!
//! This is a beta/volatility weighted approximation, not an Euler allocation
//! over a covariance matrix. Marginal VaR carries a fixed empirical scale of
//! 1/10 on top of `volatility * beta * correlation`.

use tracing::debug;

use super::error::{Result, RiskError};
use super::random::{Rng, derive_seed};
use super::types::{HoldingInput, HoldingRiskContribution};

const MARGINAL_VAR_SCALE: f64 = 10.0;
pub const SAMPLED_CORRELATION_RANGE: (f64, f64) = (0.5, 0.9);

/// Correlation-to-portfolio used for holdings that carry no measured value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrelationAssumption {
    Fixed(f64),
    /// Uniform draw from [`SAMPLED_CORRELATION_RANGE`], reproducible per seed.
    Sampled { seed: u64 },
}

impl Default for CorrelationAssumption {
    fn default() -> Self {
        CorrelationAssumption::Fixed(0.7)
    }
}

pub fn attribute_risk(
    holdings: &[HoldingInput],
    portfolio_var: f64,
    assumption: &CorrelationAssumption,
) -> Result<Vec<HoldingRiskContribution>> {
    validate(holdings, portfolio_var, assumption)?;

    let total_weighted_risk: f64 = holdings
        .iter()
        .map(|h| h.weight * h.volatility * h.beta)
        .sum();

    let mut contributions: Vec<HoldingRiskContribution> = holdings
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let correlation = h
                .correlation
                .unwrap_or_else(|| assumed_correlation(assumption, idx));
            let marginal_var =
                (h.volatility / 100.0) * h.beta * correlation * portfolio_var / MARGINAL_VAR_SCALE;
            let contribution_pct = if total_weighted_risk != 0.0 {
                h.weight * h.volatility * h.beta / total_weighted_risk * 100.0
            } else {
                0.0
            };

            HoldingRiskContribution {
                ticker: h.ticker.clone(),
                weight: h.weight,
                volatility: h.volatility,
                beta: h.beta,
                correlation,
                marginal_var,
                component_var: (h.weight / 100.0) * marginal_var,
                contribution_pct,
            }
        })
        .collect();

    contributions.sort_by(|a, b| b.contribution_pct.total_cmp(&a.contribution_pct));
    debug!(
        holdings = contributions.len(),
        portfolio_var, total_weighted_risk, "risk attribution computed"
    );
    Ok(contributions)
}

fn assumed_correlation(assumption: &CorrelationAssumption, holding_index: usize) -> f64 {
    match *assumption {
        CorrelationAssumption::Fixed(rho) => rho,
        CorrelationAssumption::Sampled { seed } => {
            let (lo, hi) = SAMPLED_CORRELATION_RANGE;
            Rng::new(derive_seed(seed, holding_index as u64)).uniform(lo, hi)
        }
    }
}

fn validate(
    holdings: &[HoldingInput],
    portfolio_var: f64,
    assumption: &CorrelationAssumption,
) -> Result<()> {
    if !portfolio_var.is_finite() || portfolio_var < 0.0 {
        return Err(RiskError::invalid_parameter("portfolio_var must be >= 0"));
    }
    if let CorrelationAssumption::Fixed(rho) = assumption {
        if !(-1.0..=1.0).contains(rho) {
            return Err(RiskError::invalid_parameter(
                "assumed correlation must be between -1 and 1",
            ));
        }
    }

    for h in holdings {
        if !h.weight.is_finite() || h.weight < 0.0 {
            return Err(RiskError::invalid_parameter(format!(
                "{}: weight must be >= 0",
                h.ticker
            )));
        }
        if !h.volatility.is_finite() || h.volatility < 0.0 {
            return Err(RiskError::invalid_parameter(format!(
                "{}: volatility must be >= 0",
                h.ticker
            )));
        }
        if !h.beta.is_finite() {
            return Err(RiskError::invalid_parameter(format!(
                "{}: beta must be finite",
                h.ticker
            )));
        }
        if let Some(rho) = h.correlation {
            if !(-1.0..=1.0).contains(&rho) {
                return Err(RiskError::invalid_parameter(format!(
                    "{}: correlation must be between -1 and 1",
                    h.ticker
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn holding(ticker: &str, weight: f64, volatility: f64, beta: f64, rho: Option<f64>) -> HoldingInput {
        HoldingInput {
            ticker: ticker.to_string(),
            weight,
            volatility,
            beta,
            correlation: rho,
        }
    }

    #[test]
    fn oracle_two_holding_decomposition_matches_hand_calculation() {
        let holdings = vec![
            holding("BND", 40.0, 10.0, 0.5, Some(0.6)),
            holding("QQQ", 60.0, 20.0, 1.2, Some(0.8)),
        ];
        let out = attribute_risk(&holdings, 10_000.0, &CorrelationAssumption::default())
            .expect("valid holdings");

        // weighted risk: QQQ 1440, BND 200, total 1640
        assert_eq!(out[0].ticker, "QQQ");
        assert_approx(out[0].marginal_var, 192.0);
        assert_approx(out[0].component_var, 115.2);
        assert_approx(out[0].contribution_pct, 1440.0 / 1640.0 * 100.0);

        assert_eq!(out[1].ticker, "BND");
        assert_approx(out[1].marginal_var, 30.0);
        assert_approx(out[1].component_var, 12.0);
        assert_approx(out[1].contribution_pct, 200.0 / 1640.0 * 100.0);
    }

    #[test]
    fn fixed_assumption_fills_missing_correlations() {
        let holdings = vec![holding("AAPL", 30.0, 25.0, 1.1, None)];
        let out = attribute_risk(&holdings, 5_000.0, &CorrelationAssumption::Fixed(0.5))
            .expect("valid holdings");
        assert_approx(out[0].correlation, 0.5);
        assert_approx(out[0].marginal_var, 0.25 * 1.1 * 0.5 * 500.0);
    }

    #[test]
    fn sampled_correlations_are_reproducible_and_in_range() {
        let holdings = vec![
            holding("AAPL", 30.0, 25.0, 1.1, None),
            holding("MSFT", 35.0, 22.0, 0.9, None),
            holding("XOM", 35.0, 28.0, 0.8, None),
        ];
        let assumption = CorrelationAssumption::Sampled { seed: 99 };
        let a = attribute_risk(&holdings, 8_000.0, &assumption).expect("valid holdings");
        let b = attribute_risk(&holdings, 8_000.0, &assumption).expect("valid holdings");

        assert_eq!(a, b);
        for c in &a {
            assert!((0.5..0.9).contains(&c.correlation), "{}", c.correlation);
        }
    }

    #[test]
    fn zero_total_risk_reports_zero_contributions() {
        let holdings = vec![holding("CASH", 100.0, 0.0, 0.0, Some(0.0))];
        let out = attribute_risk(&holdings, 1_000.0, &CorrelationAssumption::default())
            .expect("valid holdings");
        assert_approx(out[0].contribution_pct, 0.0);
        assert!(attribute_risk(&[], 1_000.0, &CorrelationAssumption::default())
            .expect("empty is valid")
            .is_empty());
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let ok = holding("A", 10.0, 10.0, 1.0, None);
        assert!(attribute_risk(&[ok.clone()], -1.0, &CorrelationAssumption::default()).is_err());
        assert!(attribute_risk(&[ok.clone()], 1.0, &CorrelationAssumption::Fixed(1.5)).is_err());
        assert!(
            attribute_risk(
                &[holding("B", -5.0, 10.0, 1.0, None)],
                1.0,
                &CorrelationAssumption::default()
            )
            .is_err()
        );
        let err = attribute_risk(
            &[holding("C", 5.0, 10.0, 1.0, Some(-2.0))],
            1.0,
            &CorrelationAssumption::default(),
        )
        .expect_err("must reject");
        assert!(err.to_string().contains("C: correlation"));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_contributions_sum_to_one_hundred_and_are_sorted(
            raw in vec((0.5f64..60.0, 1.0f64..80.0, 0.1f64..2.5), 1..12),
            portfolio_var in 0.0f64..1_000_000.0,
            seed in 0u64..1_000,
        ) {
            let holdings: Vec<HoldingInput> = raw
                .iter()
                .enumerate()
                .map(|(i, &(w, v, b))| holding(&format!("H{i}"), w, v, b, None))
                .collect();
            let out = attribute_risk(&holdings, portfolio_var, &CorrelationAssumption::Sampled { seed })
                .expect("valid holdings");

            let total: f64 = out.iter().map(|c| c.contribution_pct).sum();
            prop_assert!((total - 100.0).abs() < 1e-6, "sum {}", total);
            for pair in out.windows(2) {
                prop_assert!(pair[0].contribution_pct >= pair[1].contribution_pct);
            }
        }
    }
}
