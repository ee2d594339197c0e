//! Per-instrument mean return, variance and Sharpe ratio.
//!
//! The Sharpe ratio here divides excess return by the annualized *variance*,
//! not the standard deviation. Rankings inside a cluster depend on it.

use log::debug;

use crate::data::PriceMatrix;
use crate::error::{Error, Result, Stage};
use crate::stats;

/// Risk/return figures of one instrument.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskReturnRecord {
    pub ticker: String,
    /// Annualized compounded mean historical return.
    pub mean_return: f64,
    /// Annualized sample variance of daily returns.
    pub variance: f64,
    /// `(mean_return - risk_free_rate) / variance`
    pub sharpe_ratio: f64,
}

/// Computes one [`RiskReturnRecord`] per instrument.
#[derive(Clone, Copy, Debug)]
pub struct RiskReturnEngine {
    pub risk_free_rate: f64,
    pub frequency: f64,
}

impl RiskReturnEngine {
    pub fn new(risk_free_rate: f64, frequency: f64) -> Self {
        Self {
            risk_free_rate,
            frequency,
        }
    }

    /// Records in universe order.
    ///
    /// Fails with [`Error::DegenerateVariance`] on the first instrument (in
    /// universe order) whose returns have zero variance.
    pub fn compute(&self, prices: &PriceMatrix) -> Result<Vec<RiskReturnRecord>> {
        let returns = prices.returns();
        if returns.len() < 2 {
            return Err(Error::insufficient(
                Stage::RiskReturn,
                format!("need at least 3 price rows, got {}", prices.n_rows()),
            ));
        }
        let cols = stats::columns(&returns);

        #[cfg(feature = "parallel")]
        let records: Vec<Result<RiskReturnRecord>> = {
            use rayon::prelude::*;
            cols.par_iter()
                .zip(prices.tickers().par_iter())
                .map(|(col, ticker)| self.record(ticker, col))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let records: Vec<Result<RiskReturnRecord>> = cols
            .iter()
            .zip(prices.tickers())
            .map(|(col, ticker)| self.record(ticker, col))
            .collect();

        let records = records.into_iter().collect::<Result<Vec<_>>>()?;
        debug!(
            "risk-return: {} instruments over {} returns",
            records.len(),
            returns.len()
        );
        Ok(records)
    }

    fn record(&self, ticker: &str, returns: &[f64]) -> Result<RiskReturnRecord> {
        let mean_return = stats::mean_historical_return(returns, self.frequency);
        let variance = stats::sample_variance(returns) * self.frequency;
        if !(variance > 0.0) || !variance.is_finite() {
            return Err(Error::DegenerateVariance {
                stage: Stage::RiskReturn,
                instrument: ticker.to_string(),
            });
        }
        Ok(RiskReturnRecord {
            ticker: ticker.to_string(),
            mean_return,
            variance,
            sharpe_ratio: (mean_return - self.risk_free_rate) / variance,
        })
    }
}
