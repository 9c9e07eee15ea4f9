use rayon::prelude::*;
use tracing::debug;

use super::error::Result;
use super::random::{BoxMuller, NormalSource, derive_seed};
use super::report::{build_fan_chart, build_histogram};
use super::risk::RiskSummary;
use super::stats::OutcomeDistribution;
use super::types::{FanPoint, HistogramBucket, SimulationParameters, SimulationResult};

/// Row-major `num_paths x num_points` buffer; row `i` is path `i`.
#[derive(Debug, Clone)]
pub struct PathMatrix {
    values: Vec<f64>,
    num_paths: usize,
    num_points: usize,
}

impl PathMatrix {
    fn zeroed(num_paths: usize, num_points: usize) -> Self {
        Self {
            values: vec![0.0; num_paths * num_points],
            num_paths,
            num_points,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: &[Vec<f64>]) -> Self {
        let num_points = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * num_points);
        for row in rows {
            assert_eq!(row.len(), num_points, "ragged path rows");
            values.extend_from_slice(row);
        }
        Self {
            values,
            num_paths: rows.len(),
            num_points,
        }
    }

    pub fn num_paths(&self) -> usize {
        self.num_paths
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn path(&self, index: usize) -> &[f64] {
        let start = index * self.num_points;
        &self.values[start..start + self.num_points]
    }

    pub fn paths(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.num_points)
    }

    /// Values of every path at one time step.
    pub fn column(&self, step: usize) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .skip(step)
            .step_by(self.num_points)
            .copied()
    }

    pub fn terminal_values(&self) -> Vec<f64> {
        self.column(self.num_points - 1).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub seed: u64,
    /// Histogram bucket count; `None` skips the histogram.
    pub histogram_buckets: Option<usize>,
    /// Retains the full path matrix to build the percentile fan.
    pub include_fan: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            histogram_buckets: Some(30),
            include_fan: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub result: SimulationResult,
    pub histogram: Option<Vec<HistogramBucket>>,
    pub fan_chart: Option<Vec<FanPoint>>,
}

pub fn run_simulation(params: &SimulationParameters, options: &RunOptions) -> Result<SimulationOutput> {
    params.validate()?;
    debug!(
        simulations = params.num_simulations,
        months = params.num_months(),
        seed = options.seed,
        include_fan = options.include_fan,
        "starting monte carlo run"
    );

    let (final_values, fan_chart) = if options.include_fan {
        let paths = simulate_paths(params, options.seed)?;
        let fan = build_fan_chart(&paths, params.initial_value);
        (paths.terminal_values(), Some(fan))
    } else {
        (simulate_terminal_values(params, options.seed)?, None)
    };

    let histogram = match options.histogram_buckets {
        Some(buckets) => Some(build_histogram(
            &final_values,
            params.initial_value,
            buckets,
        )?),
        None => None,
    };

    let dist = OutcomeDistribution::new(final_values, params.initial_value, params.target_return)?;
    let result = summarize(params, &dist);
    debug!(
        expected_value = result.expected_value,
        probability_of_loss = result.probability_of_loss,
        var_95 = result.var_95,
        "monte carlo run complete"
    );

    Ok(SimulationOutput {
        result,
        histogram,
        fan_chart,
    })
}

pub fn summarize(params: &SimulationParameters, dist: &OutcomeDistribution) -> SimulationResult {
    let risk = RiskSummary::from_distribution(dist);
    SimulationResult {
        num_simulations: dist.len(),
        num_steps: params.num_points(),
        percentiles: dist.percentiles(),
        probability_of_loss: dist.probability_of_loss(),
        probability_of_target: dist.probability_of_target(),
        expected_value: dist.expected_value(),
        expected_return_pct: dist.expected_return_pct(),
        volatility_of_outcomes: dist.volatility_of_outcomes(),
        var_95: risk.var_95.amount,
        var_95_pct: risk.var_95.percent,
        var_99: risk.var_99.amount,
        var_99_pct: risk.var_99.percent,
        cvar_95: risk.cvar_95.amount,
        cvar_95_pct: risk.cvar_95.percent,
        cvar_99: risk.cvar_99.amount,
        cvar_99_pct: risk.cvar_99.percent,
    }
}

pub fn simulate_paths(params: &SimulationParameters, seed: u64) -> Result<PathMatrix> {
    simulate_paths_with(params, |path_id| BoxMuller::new(derive_seed(seed, path_id as u64)))
}

/// Simulates every path, asking `source_for` for an independent normal source per path.
pub fn simulate_paths_with<S, F>(params: &SimulationParameters, source_for: F) -> Result<PathMatrix>
where
    S: NormalSource,
    F: Fn(usize) -> S + Sync,
{
    params.validate()?;
    let mut matrix = PathMatrix::zeroed(params.num_simulations as usize, params.num_points());
    let num_points = matrix.num_points;

    matrix
        .values
        .par_chunks_mut(num_points)
        .enumerate()
        .for_each(|(path_id, row)| {
            let mut source = source_for(path_id);
            advance_path(params, &mut source, Some(row));
        });

    Ok(matrix)
}

pub fn simulate_terminal_values(params: &SimulationParameters, seed: u64) -> Result<Vec<f64>> {
    simulate_terminal_values_with(params, |path_id| {
        BoxMuller::new(derive_seed(seed, path_id as u64))
    })
}

/// Same draws as [`simulate_paths_with`] without retaining intermediate steps.
pub fn simulate_terminal_values_with<S, F>(
    params: &SimulationParameters,
    source_for: F,
) -> Result<Vec<f64>>
where
    S: NormalSource,
    F: Fn(usize) -> S + Sync,
{
    params.validate()?;
    Ok((0..params.num_simulations as usize)
        .into_par_iter()
        .map(|path_id| {
            let mut source = source_for(path_id);
            advance_path(params, &mut source, None)
        })
        .collect())
}

/// Walks one path forward month by month and returns its terminal value.
/// When `trace` is given it must hold `num_points` slots.
fn advance_path<S: NormalSource>(
    params: &SimulationParameters,
    source: &mut S,
    mut trace: Option<&mut [f64]>,
) -> f64 {
    let monthly_return = params.monthly_return();
    let monthly_vol = params.monthly_volatility();
    let mut value = params.initial_value;

    if let Some(row) = trace.as_deref_mut() {
        row[0] = value;
    }

    for step in 1..=params.num_months() {
        let z = source.standard_normal();
        value *= 1.0 + monthly_return + monthly_vol * z;
        if let Some(row) = trace.as_deref_mut() {
            row[step] = value;
        }
    }

    value
}
