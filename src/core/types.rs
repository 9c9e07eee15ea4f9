use serde::Serialize;

use super::error::{Result, RiskError};

pub const MONTHS_PER_YEAR: f64 = 12.0;
/// Longest horizon, in monthly steps, a single run may cover.
pub const MAX_MONTHS: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    /// Starting portfolio value in currency units.
    pub initial_value: f64,
    /// Annualized expected return in percent.
    pub expected_return: f64,
    /// Annualized volatility in percent.
    pub volatility: f64,
    pub time_horizon_years: f64,
    pub num_simulations: u32,
    /// Growth threshold of interest in percent of `initial_value`.
    pub target_return: f64,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("initial_value", self.initial_value),
            ("expected_return", self.expected_return),
            ("volatility", self.volatility),
            ("time_horizon_years", self.time_horizon_years),
            ("target_return", self.target_return),
        ] {
            if !value.is_finite() {
                return Err(RiskError::invalid_parameter(format!(
                    "{name} must be finite"
                )));
            }
        }

        if self.initial_value <= 0.0 {
            return Err(RiskError::invalid_parameter("initial_value must be > 0"));
        }
        if self.volatility < 0.0 {
            return Err(RiskError::invalid_parameter("volatility must be >= 0"));
        }
        if self.time_horizon_years <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "time_horizon_years must be > 0",
            ));
        }
        if self.rounded_months() > f64::from(MAX_MONTHS) {
            return Err(RiskError::invalid_parameter(format!(
                "time_horizon_years must cover at most {MAX_MONTHS} months"
            )));
        }
        if self.num_months() == 0 {
            return Err(RiskError::invalid_parameter(
                "time_horizon_years must cover at least one month",
            ));
        }
        if self.num_simulations == 0 {
            return Err(RiskError::invalid_parameter("num_simulations must be > 0"));
        }
        Ok(())
    }

    fn rounded_months(&self) -> f64 {
        (self.time_horizon_years * MONTHS_PER_YEAR).round()
    }

    /// Number of monthly steps, excluding the starting point. Saturates at
    /// [`MAX_MONTHS`]; `validate` rejects horizons beyond it.
    pub fn num_months(&self) -> usize {
        let months = self.rounded_months();
        if months.is_finite() && months > 0.0 {
            months.min(f64::from(MAX_MONTHS)) as usize
        } else {
            0
        }
    }

    /// Points per path, including the starting value at step 0.
    pub fn num_points(&self) -> usize {
        self.num_months().saturating_add(1)
    }

    pub fn monthly_return(&self) -> f64 {
        self.expected_return / MONTHS_PER_YEAR / 100.0
    }

    pub fn monthly_volatility(&self) -> f64 {
        self.volatility / MONTHS_PER_YEAR.sqrt() / 100.0
    }

    pub fn target_value(&self) -> f64 {
        self.initial_value * (1.0 + self.target_return / 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub num_simulations: usize,
    pub num_steps: usize,
    pub percentiles: Percentiles,
    pub probability_of_loss: f64,
    pub probability_of_target: f64,
    pub expected_value: f64,
    pub expected_return_pct: f64,
    /// Population standard deviation of terminal values, percent of initial value.
    pub volatility_of_outcomes: f64,
    pub var_95: f64,
    pub var_95_pct: f64,
    pub var_99: f64,
    pub var_99_pct: f64,
    pub cvar_95: f64,
    pub cvar_95_pct: f64,
    pub cvar_99: f64,
    pub cvar_99_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    pub range_start: f64,
    pub range_end: f64,
    pub midpoint: f64,
    pub count: usize,
    pub frequency: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HistogramResolution {
    Standard,
    Coarse,
}

impl HistogramResolution {
    pub fn bucket_count(self) -> usize {
        match self {
            HistogramResolution::Standard => 30,
            HistogramResolution::Coarse => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanPoint {
    pub month: usize,
    /// Percent returns relative to the initial value across all paths at this step.
    #[serde(flatten)]
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingInput {
    pub ticker: String,
    /// Portfolio weight in percent.
    pub weight: f64,
    /// Annualized volatility in percent.
    pub volatility: f64,
    pub beta: f64,
    /// Measured correlation to the portfolio; `None` defers to the attribution assumption.
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRiskContribution {
    pub ticker: String,
    pub weight: f64,
    pub volatility: f64,
    pub beta: f64,
    pub correlation: f64,
    pub marginal_var: f64,
    pub component_var: f64,
    pub contribution_pct: f64,
}
