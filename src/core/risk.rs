use serde::Serialize;

use super::stats::OutcomeDistribution;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Confidence {
    P95,
    P99,
}

impl Confidence {
    /// Lower-tail probability, `1 - confidence`.
    pub fn tail_probability(self) -> f64 {
        match self {
            Confidence::P95 => 0.05,
            Confidence::P99 => 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskMeasure {
    /// Loss in currency units, never negative.
    pub amount: f64,
    /// Loss as a percentage of the initial value.
    pub percent: f64,
}

impl RiskMeasure {
    fn from_outcome(initial_value: f64, outcome: f64) -> Self {
        let amount = (initial_value - outcome).max(0.0);
        Self {
            amount,
            percent: amount / initial_value * 100.0,
        }
    }
}

pub fn value_at_risk(dist: &OutcomeDistribution, confidence: Confidence) -> RiskMeasure {
    let cutoff = dist.percentile(confidence.tail_probability());
    RiskMeasure::from_outcome(dist.initial_value(), cutoff)
}

/// Expected shortfall: mean of the `floor(n * tail)` worst outcomes. Falls
/// back to the VaR cutoff when the tail rounds to zero elements.
pub fn conditional_value_at_risk(dist: &OutcomeDistribution, confidence: Confidence) -> RiskMeasure {
    let tail = confidence.tail_probability();
    let tail_len = (dist.len() as f64 * tail).floor() as usize;
    let tail_values = &dist.sorted()[..tail_len.min(dist.len())];

    let outcome = if tail_values.is_empty() {
        dist.percentile(tail)
    } else {
        tail_values.iter().sum::<f64>() / tail_values.len() as f64
    };
    RiskMeasure::from_outcome(dist.initial_value(), outcome)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSummary {
    pub var_95: RiskMeasure,
    pub var_99: RiskMeasure,
    pub cvar_95: RiskMeasure,
    pub cvar_99: RiskMeasure,
}

impl RiskSummary {
    pub fn from_distribution(dist: &OutcomeDistribution) -> Self {
        Self {
            var_95: value_at_risk(dist, Confidence::P95),
            var_99: value_at_risk(dist, Confidence::P99),
            cvar_95: conditional_value_at_risk(dist, Confidence::P95),
            cvar_99: conditional_value_at_risk(dist, Confidence::P99),
        }
    }
}
