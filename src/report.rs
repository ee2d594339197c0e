//! Portfolio statistics and the final report.
//!
//! Statistics run on the full requested history, not the clustering window.
//! Annualization uses the number of price rows as frequency, so expected
//! return and volatility describe the whole horizon.

use log::info;

use crate::allocation::AllocationResult;
use crate::cluster::ClusterAssignment;
use crate::data::{BenchmarkSeries, PriceMatrix};
use crate::error::{Error, Result, Stage};
use crate::optimize::WeightVector;
use crate::selector::Portfolio;
use crate::stats;

/// Everything one run produces. Values keep full precision; use
/// [`summary`](PortfolioReport::summary) for display.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortfolioReport {
    pub clusters: ClusterAssignment,
    pub portfolio: Portfolio,
    pub weights: WeightVector,
    pub allocation: AllocationResult,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub beta: f64,
}

/// Expected return, volatility and Sharpe ratio of a weighted portfolio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Performance {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Computes performance and beta of the optimized weights.
#[derive(Clone, Copy, Debug)]
pub struct StatsReporter {
    pub risk_free_rate: f64,
}

impl StatsReporter {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    /// Performance over `prices`, annualized with `frequency = prices.n_rows()`.
    pub fn performance(&self, prices: &PriceMatrix, weights: &WeightVector) -> Result<Performance> {
        let tickers: Vec<String> = weights.tickers().into_iter().map(String::from).collect();
        let prices = prices.select(&tickers)?;
        let returns = prices.returns();
        if returns.len() < 2 {
            return Err(Error::insufficient(
                Stage::Statistics,
                format!("need at least 3 price rows, got {}", prices.n_rows()),
            ));
        }

        let frequency = prices.n_rows() as f64;
        let mu = stats::expected_returns(&returns, frequency);
        let sigma = stats::sample_cov(&returns, frequency);
        let w = weights.values();

        let expected_return = stats::dot(&w, &mu);
        let volatility = stats::quadratic_form(&sigma, &w).max(0.0).sqrt();
        if !(volatility > 0.0) {
            return Err(Error::DegenerateVariance {
                stage: Stage::Statistics,
                instrument: "portfolio".into(),
            });
        }

        Ok(Performance {
            expected_return,
            volatility,
            sharpe_ratio: (expected_return - self.risk_free_rate) / volatility,
        })
    }

    /// `cov(portfolio, benchmark) / var(benchmark)` on daily returns over the
    /// dates both series share.
    pub fn beta(
        &self,
        prices: &PriceMatrix,
        benchmark: &BenchmarkSeries,
        weights: &WeightVector,
    ) -> Result<f64> {
        let idx: Vec<(usize, f64)> = weights
            .iter()
            .map(|(t, w)| {
                prices
                    .index_of(t)
                    .map(|j| (j, w))
                    .ok_or_else(|| Error::insufficient(Stage::Statistics, format!("unknown instrument {t}")))
            })
            .collect::<Result<_>>()?;

        // Rows whose date the benchmark also has.
        let aligned: Vec<(&[f64], f64)> = prices
            .dates()
            .iter()
            .zip(prices.rows())
            .filter_map(|(d, row)| benchmark.close_on(*d).map(|c| (row.as_slice(), c)))
            .collect();
        if aligned.len() < 3 {
            return Err(Error::insufficient(
                Stage::Statistics,
                format!("only {} dates shared with benchmark {}", aligned.len(), benchmark.name),
            ));
        }

        let (portfolio, index): (Vec<f64>, Vec<f64>) = aligned
            .windows(2)
            .map(|pair| {
                let (prev, prev_close) = pair[0];
                let (next, next_close) = pair[1];
                let r: f64 = idx.iter().map(|&(j, w)| w * (next[j] / prev[j] - 1.0)).sum();
                (r, next_close / prev_close - 1.0)
            })
            .unzip();

        let var = stats::sample_variance(&index);
        if !(var > 0.0) {
            return Err(Error::DegenerateVariance {
                stage: Stage::Statistics,
                instrument: benchmark.name.clone(),
            });
        }
        Ok(stats::sample_covariance(&portfolio, &index) / var)
    }

    /// Assemble the final report.
    pub fn report(
        &self,
        prices: &PriceMatrix,
        benchmark: &BenchmarkSeries,
        clusters: ClusterAssignment,
        portfolio: Portfolio,
        weights: WeightVector,
        allocation: AllocationResult,
    ) -> Result<PortfolioReport> {
        let perf = self.performance(prices, &weights)?;
        let beta = self.beta(prices, benchmark, &weights)?;
        info!(
            "portfolio: return {:.4}, volatility {:.4}, sharpe {:.4}, beta {:.4}",
            perf.expected_return, perf.volatility, perf.sharpe_ratio, beta
        );
        Ok(PortfolioReport {
            clusters,
            portfolio,
            weights,
            allocation,
            expected_return: perf.expected_return,
            volatility: perf.volatility,
            sharpe_ratio: perf.sharpe_ratio,
            beta,
        })
    }
}

/// Round half away from zero to two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One instrument line of a [`ReportSummary`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoldingLine {
    pub ticker: String,
    pub weight_pct: f64,
    pub shares: u64,
}

/// Display-ready view of a report, every figure rounded to 2 decimals.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportSummary {
    /// Nonzero-weight holdings in portfolio order.
    pub holdings: Vec<HoldingLine>,
    pub leftover: f64,
    pub expected_return_pct: f64,
    pub volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub beta: f64,
    pub budget_too_small: bool,
}

impl PortfolioReport {
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            holdings: self
                .weights
                .nonzero()
                .map(|(t, w)| HoldingLine {
                    ticker: t.to_string(),
                    weight_pct: round2(w * 100.0),
                    shares: self.allocation.shares_of(t),
                })
                .collect(),
            leftover: round2(self.allocation.leftover),
            expected_return_pct: round2(self.expected_return * 100.0),
            volatility_pct: round2(self.volatility * 100.0),
            sharpe_ratio: round2(self.sharpe_ratio),
            beta: round2(self.beta),
            budget_too_small: self.allocation.budget_too_small,
        }
    }
}
