mod attribution;
mod engine;
mod error;
mod random;
mod report;
mod risk;
mod stats;
mod types;

pub use attribution::{CorrelationAssumption, SAMPLED_CORRELATION_RANGE, attribute_risk};
pub use engine::{
    PathMatrix, RunOptions, SimulationOutput, run_simulation, simulate_paths, simulate_paths_with,
    simulate_terminal_values, simulate_terminal_values_with, summarize,
};
pub use error::{Result, RiskError};
pub use random::{BoxMuller, NormalSource, Rng, derive_seed};
pub use report::{build_fan_chart, build_histogram};
pub use risk::{Confidence, RiskMeasure, RiskSummary, conditional_value_at_risk, value_at_risk};
pub use stats::{OutcomeDistribution, nearest_rank_percentile, percentile_bands};
pub use types::{
    FanPoint, HistogramBucket, HistogramResolution, HoldingInput, HoldingRiskContribution,
    Percentiles, SimulationParameters, SimulationResult,
};
