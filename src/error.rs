//! Error taxonomy for a pipeline run.
//!
//! Every variant aborts the run. A too-small budget is not an error: it is
//! reported through [`AllocationResult::budget_too_small`](crate::AllocationResult).

use std::fmt;

/// Pipeline stage that raised an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    Window,
    Dissimilarity,
    Clustering,
    RiskReturn,
    Selection,
    Optimization,
    Allocation,
    Statistics,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Window => "window",
            Stage::Dissimilarity => "dissimilarity",
            Stage::Clustering => "clustering",
            Stage::RiskReturn => "risk-return",
            Stage::Selection => "selection",
            Stage::Optimization => "optimization",
            Stage::Allocation => "allocation",
            Stage::Statistics => "statistics",
        };
        f.write_str(name)
    }
}

/// Errors returned by the portfolio pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{stage}: insufficient data: {detail}")]
    InsufficientData { stage: Stage, detail: String },

    #[error("clustering: cannot form {requested} clusters from {instruments} instruments")]
    InvalidClusterCount { requested: usize, instruments: usize },

    #[error("selection: cluster {label} has no members")]
    EmptyCluster { label: usize },

    #[error("{stage}: zero variance for {instrument}")]
    DegenerateVariance { stage: Stage, instrument: String },

    #[error(
        "optimization: bounds [{lower}, {upper}] admit no weights summing to 1 over {assets} assets"
    )]
    InfeasibleOptimization { assets: usize, lower: f64, upper: f64 },

    #[error("optimization: no portfolio within the weight bounds has expected return above the risk-free rate {risk_free_rate}")]
    NoExcessReturn { risk_free_rate: f64 },

    #[error("{stage}: invalid price {price} for {instrument}")]
    InvalidPrice {
        stage: Stage,
        instrument: String,
        price: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("price source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an error raised by a [`PriceSource`](crate::PriceSource).
    pub fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Source(Box::new(err))
    }

    pub(crate) fn insufficient(stage: Stage, detail: impl Into<String>) -> Self {
        Error::InsufficientData {
            stage,
            detail: detail.into(),
        }
    }

    /// Stage the error was raised in, when it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::InsufficientData { stage, .. }
            | Error::DegenerateVariance { stage, .. }
            | Error::InvalidPrice { stage, .. } => Some(*stage),
            Error::InvalidClusterCount { .. } => Some(Stage::Clustering),
            Error::EmptyCluster { .. } => Some(Stage::Selection),
            Error::InfeasibleOptimization { .. } | Error::NoExcessReturn { .. } => {
                Some(Stage::Optimization)
            }
            Error::InvalidConfig(_) | Error::Source(_) => None,
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
