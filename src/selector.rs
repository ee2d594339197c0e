//! Picks one representative per cluster: the member with the highest Sharpe
//! ratio. Ties go to the member that comes first in universe order.

use log::debug;

use crate::cluster::ClusterAssignment;
use crate::error::{Error, Result, Stage};
use crate::risk_return::RiskReturnRecord;

/// Candidate universe, one instrument per cluster in label order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Portfolio {
    tickers: Vec<String>,
}

impl Portfolio {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }
}

/// Select the highest-Sharpe member of every cluster.
///
/// `records` must be in the same universe order as the assignment.
pub fn select_portfolio(
    clusters: &ClusterAssignment,
    records: &[RiskReturnRecord],
) -> Result<Portfolio> {
    if records.len() != clusters.tickers().len() {
        return Err(Error::insufficient(
            Stage::Selection,
            format!(
                "{} risk-return records for {} clustered instruments",
                records.len(),
                clusters.tickers().len()
            ),
        ));
    }

    let mut tickers = Vec::with_capacity(clusters.len());
    for (label, members) in clusters.iter() {
        let mut best: Option<usize> = None;
        for &i in members {
            let sharpe = records[i].sharpe_ratio;
            match best {
                Some(b) if records[b].sharpe_ratio >= sharpe => {}
                _ if sharpe.is_nan() => {}
                _ => best = Some(i),
            }
        }
        let Some(best) = best else {
            return Err(Error::EmptyCluster { label });
        };
        debug!(
            "cluster {label}: {} of {} members (sharpe {:.4})",
            records[best].ticker,
            members.len(),
            records[best].sharpe_ratio
        );
        tickers.push(records[best].ticker.clone());
    }

    Ok(Portfolio { tickers })
}
