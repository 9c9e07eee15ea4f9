//! Monte Carlo portfolio-risk engine.
//!
//! Projects a portfolio forward under a monthly geometric random walk and
//! reduces the simulated outcomes to percentiles, VaR/CVaR, a return
//! histogram, a percentile fan and a per-holding risk attribution.

pub mod api;
pub mod core;
