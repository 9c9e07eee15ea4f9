use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    CorrelationAssumption, FanPoint, HistogramBucket, HistogramResolution, HoldingInput,
    HoldingRiskContribution, RunOptions, SimulationParameters, SimulationResult, attribute_risk,
    run_simulation,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliHistogramResolution {
    Standard,
    Coarse,
}

impl From<CliHistogramResolution> for HistogramResolution {
    fn from(value: CliHistogramResolution) -> Self {
        match value {
            CliHistogramResolution::Standard => HistogramResolution::Standard,
            CliHistogramResolution::Coarse => HistogramResolution::Coarse,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiHistogramResolution {
    #[serde(alias = "fine", alias = "default")]
    Standard,
    #[serde(alias = "compact", alias = "summary")]
    Coarse,
}

impl From<ApiHistogramResolution> for CliHistogramResolution {
    fn from(value: ApiHistogramResolution) -> Self {
        match value {
            ApiHistogramResolution::Standard => CliHistogramResolution::Standard,
            ApiHistogramResolution::Coarse => CliHistogramResolution::Coarse,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    initial_value: Option<f64>,
    expected_return: Option<f64>,
    volatility: Option<f64>,
    #[serde(alias = "timeHorizon", alias = "years")]
    time_horizon_years: Option<f64>,
    #[serde(alias = "simulations")]
    num_simulations: Option<u32>,
    target_return: Option<f64>,
    seed: Option<u64>,
    histogram_resolution: Option<ApiHistogramResolution>,
    histogram_buckets: Option<usize>,
    include_fan: Option<bool>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mcrisk",
    about = "Monte Carlo portfolio risk engine (percentiles, VaR, CVaR, fan charts)"
)]
struct Cli {
    #[arg(long, default_value_t = 100_000.0, help = "Starting portfolio value")]
    initial_value: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Expected annual return in percent, e.g. 8"
    )]
    expected_return: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Annual return volatility in percent"
    )]
    volatility: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Projection horizon in years, simulated monthly"
    )]
    time_horizon_years: f64,
    #[arg(long, default_value_t = 5_000)]
    simulations: u32,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Portfolio growth threshold of interest in percent"
    )]
    target_return: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliHistogramResolution::Standard,
        help = "Histogram preset: standard (30 buckets) or coarse (8 buckets)"
    )]
    histogram_resolution: CliHistogramResolution,
    #[arg(long, help = "Explicit histogram bucket count, overrides the preset")]
    histogram_buckets: Option<usize>,
    #[arg(long, help = "Skip the percentile fan chart and keep only terminal values")]
    no_fan: bool,
    #[arg(
        long,
        default_value_t = 20_000_000,
        help = "Upper bound on simulations x path points per request"
    )]
    max_path_points: u64,
}

#[derive(Debug)]
struct ApiRequest {
    params: SimulationParameters,
    options: RunOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    seed: u64,
    parameters: SimulationParameters,
    result: SimulationResult,
    histogram: Option<Vec<HistogramBucket>>,
    fan_chart: Option<Vec<FanPoint>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoldingPayload {
    ticker: String,
    weight: f64,
    volatility: f64,
    beta: f64,
    #[serde(default)]
    correlation: Option<f64>,
}

impl From<HoldingPayload> for HoldingInput {
    fn from(value: HoldingPayload) -> Self {
        HoldingInput {
            ticker: value.ticker,
            weight: value.weight,
            volatility: value.volatility,
            beta: value.beta,
            correlation: value.correlation,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributionPayload {
    holdings: Vec<HoldingPayload>,
    portfolio_var: f64,
    /// Correlation applied to holdings without a measured value.
    #[serde(default)]
    correlation: Option<f64>,
    /// Samples missing correlations reproducibly instead of using a fixed value.
    #[serde(default)]
    correlation_seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttributionResponse {
    portfolio_var: f64,
    holdings: Vec<HoldingRiskContribution>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn build_request(cli: Cli) -> Result<ApiRequest, String> {
    if !cli.initial_value.is_finite() || cli.initial_value <= 0.0 {
        return Err("--initial-value must be > 0".to_string());
    }

    if !cli.volatility.is_finite() || cli.volatility < 0.0 {
        return Err("--volatility must be >= 0".to_string());
    }

    if !cli.expected_return.is_finite() {
        return Err("--expected-return must be finite".to_string());
    }

    if !cli.target_return.is_finite() {
        return Err("--target-return must be finite".to_string());
    }

    if !cli.time_horizon_years.is_finite() || cli.time_horizon_years <= 0.0 {
        return Err("--time-horizon-years must be > 0".to_string());
    }

    if cli.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }

    if cli.histogram_buckets == Some(0) {
        return Err("--histogram-buckets must be > 0".to_string());
    }

    let params = SimulationParameters {
        initial_value: cli.initial_value,
        expected_return: cli.expected_return,
        volatility: cli.volatility,
        time_horizon_years: cli.time_horizon_years,
        num_simulations: cli.simulations,
        target_return: cli.target_return,
    };

    if params.num_months() == 0 {
        return Err("--time-horizon-years must cover at least one month".to_string());
    }

    params.validate().map_err(|e| e.to_string())?;

    let path_points = u64::from(cli.simulations)
        .checked_mul(params.num_points() as u64)
        .filter(|&points| points <= cli.max_path_points)
        .ok_or_else(|| {
            format!(
                "--simulations x path points exceeds --max-path-points ({})",
                cli.max_path_points
            )
        })?;
    debug!(path_points, "request within path point bound");

    let resolution: HistogramResolution = cli.histogram_resolution.into();
    Ok(ApiRequest {
        params,
        options: RunOptions {
            seed: cli.seed,
            histogram_buckets: Some(
                cli.histogram_buckets
                    .unwrap_or_else(|| resolution.bucket_count()),
            ),
            include_fan: !cli.no_fan,
        },
    })
}

/// One-shot CLI run: parses flags after `simulate` and prints the JSON report.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;
    let request = build_request(cli)?;
    let response = execute_simulation(&request)?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("Failed to encode report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    info!("Risk engine HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/risk-attribution", post(attribution_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    info!(
        simulations = request.params.num_simulations,
        years = request.params.time_horizon_years,
        seed = request.options.seed,
        "simulate request"
    );
    match execute_simulation(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn attribution_handler(Json(payload): Json<AttributionPayload>) -> Response {
    match attribution_from_payload(payload) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!(error = %msg, "rejected risk attribution request");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn execute_simulation(request: &ApiRequest) -> Result<SimulateResponse, String> {
    let output = run_simulation(&request.params, &request.options).map_err(|e| e.to_string())?;
    Ok(SimulateResponse {
        seed: request.options.seed,
        parameters: request.params,
        result: output.result,
        histogram: output.histogram,
        fan_chart: output.fan_chart,
    })
}

fn attribution_from_payload(payload: AttributionPayload) -> Result<AttributionResponse, String> {
    let assumption = match (payload.correlation, payload.correlation_seed) {
        (Some(_), Some(_)) => {
            return Err("correlation and correlationSeed are mutually exclusive".to_string());
        }
        (Some(rho), None) => CorrelationAssumption::Fixed(rho),
        (None, Some(seed)) => CorrelationAssumption::Sampled { seed },
        (None, None) => CorrelationAssumption::default(),
    };

    let holdings: Vec<HoldingInput> = payload.holdings.into_iter().map(Into::into).collect();
    let contributions =
        attribute_risk(&holdings, payload.portfolio_var, &assumption).map_err(|e| e.to_string())?;

    Ok(AttributionResponse {
        portfolio_var: payload.portfolio_var,
        holdings: contributions,
    })
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.initial_value {
        cli.initial_value = v;
    }
    if let Some(v) = payload.expected_return {
        cli.expected_return = v;
    }
    if let Some(v) = payload.volatility {
        cli.volatility = v;
    }
    if let Some(v) = payload.time_horizon_years {
        cli.time_horizon_years = v;
    }
    if let Some(v) = payload.num_simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.target_return {
        cli.target_return = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.histogram_resolution {
        cli.histogram_resolution = v.into();
    }
    if let Some(v) = payload.histogram_buckets {
        cli.histogram_buckets = Some(v);
    }
    if let Some(v) = payload.include_fan {
        cli.no_fan = !v;
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        initial_value: 100_000.0,
        expected_return: 8.0,
        volatility: 15.0,
        time_horizon_years: 10.0,
        simulations: 5_000,
        target_return: 50.0,
        seed: 42,
        histogram_resolution: CliHistogramResolution::Standard,
        histogram_buckets: None,
        no_fan: false,
        max_path_points: 20_000_000,
    }
}
