//! Correlation distance between instruments.
//!
//! `d = sqrt(2 * (1 - corr))`. Only the upper triangle (diagonal included) is
//! stored; entries below the diagonal read as zero through [`raw`]. Consumers
//! that need a symmetric distance must go through [`distance`], which always
//! reads the upper triangle. Treating the raw matrix as symmetric is wrong.
//!
//! [`raw`]: DissimilarityMatrix::raw
//! [`distance`]: DissimilarityMatrix::distance

use log::debug;

use crate::config::CorrelationBasis;
use crate::data::PriceMatrix;
use crate::error::{Error, Result, Stage};
use crate::stats;

/// Upper-triangular correlation-distance matrix.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DissimilarityMatrix {
    tickers: Vec<String>,
    upper: Vec<Vec<f64>>,
}

impl DissimilarityMatrix {
    /// Build from a full correlation matrix.
    ///
    /// The correlation is symmetrized as `(C + C') / 2` and its diagonal
    /// forced to exactly 1 before mapping to distances.
    pub fn from_correlation(tickers: Vec<String>, corr: &[Vec<f64>]) -> Result<Self> {
        let n = tickers.len();
        if n < 2 {
            return Err(Error::insufficient(
                Stage::Dissimilarity,
                format!("need at least 2 instruments, got {n}"),
            ));
        }
        if corr.len() != n || corr.iter().any(|row| row.len() != n) {
            return Err(Error::insufficient(
                Stage::Dissimilarity,
                format!("correlation matrix is not {n}x{n}"),
            ));
        }

        // A constant series has an undefined self-correlation.
        if let Some(i) = (0..n).find(|&i| corr[i][i].is_nan()) {
            return Err(Error::DegenerateVariance {
                stage: Stage::Dissimilarity,
                instrument: tickers[i].clone(),
            });
        }
        for i in 0..n {
            if let Some(j) = (0..n).find(|&j| !corr[i][j].is_finite()) {
                return Err(Error::insufficient(
                    Stage::Dissimilarity,
                    format!("undefined correlation between {} and {}", tickers[i], tickers[j]),
                ));
            }
        }

        let mut upper = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let c = ((corr[i][j] + corr[j][i]) / 2.0).clamp(-1.0, 1.0);
                upper[i][j] = (2.0 * (1.0 - c)).sqrt();
            }
        }

        Ok(Self { tickers, upper })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Stored entry: the distance for `i < j`, zero on and below the diagonal.
    pub fn raw(&self, i: usize, j: usize) -> f64 {
        self.upper[i][j]
    }

    /// Symmetric distance between instruments `i` and `j`.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        if i <= j {
            self.upper[i][j]
        } else {
            self.upper[j][i]
        }
    }
}

/// Computes the dissimilarity matrix of a windowed price matrix.
#[derive(Clone, Copy, Debug, Default)]
pub struct DissimilarityEngine {
    pub basis: CorrelationBasis,
}

impl DissimilarityEngine {
    pub fn new(basis: CorrelationBasis) -> Self {
        Self { basis }
    }

    pub fn compute(&self, prices: &PriceMatrix) -> Result<DissimilarityMatrix> {
        if prices.n_instruments() < 2 {
            return Err(Error::insufficient(
                Stage::Dissimilarity,
                format!("need at least 2 instruments, got {}", prices.n_instruments()),
            ));
        }

        let corr = match self.basis {
            CorrelationBasis::Prices => {
                if prices.n_rows() < 2 {
                    return Err(Error::insufficient(
                        Stage::Dissimilarity,
                        "need at least 2 price rows",
                    ));
                }
                stats::correlation_matrix(prices.rows())
            }
            CorrelationBasis::Returns => {
                let returns = prices.returns();
                if returns.len() < 2 {
                    return Err(Error::insufficient(
                        Stage::Dissimilarity,
                        "need at least 2 return rows",
                    ));
                }
                stats::correlation_matrix(&returns)
            }
        };

        debug!(
            "dissimilarity over {} instruments, {} rows, basis {:?}",
            prices.n_instruments(),
            prices.n_rows(),
            self.basis
        );
        DissimilarityMatrix::from_correlation(prices.tickers().to_vec(), &corr)
    }
}
