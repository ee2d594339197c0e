//! Pipeline configuration threaded through every stage.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Inclusive per-instrument weight bounds. The optimizer is long-only.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightBounds {
    pub lower: f64,
    pub upper: f64,
}

impl WeightBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// True if `n` weights inside the bounds can sum to 1.
    pub fn admits(&self, n: usize) -> bool {
        let n = n as f64;
        n > 0.0 && n * self.lower <= 1.0 + 1e-12 && n * self.upper >= 1.0 - 1e-12
    }

    pub fn contains(&self, w: f64, tol: f64) -> bool {
        w >= self.lower - tol && w <= self.upper + tol
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 0.2,
        }
    }
}

/// Which series the correlation distance is computed on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CorrelationBasis {
    /// Correlate price levels directly.
    #[default]
    Prices,
    /// Correlate daily simple returns.
    Returns,
}

/// Settings for the projected-gradient max-Sharpe solver.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Squared step length below which the iteration stops.
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-12,
        }
    }
}

/// Parameters of one pipeline run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Trailing rows used for clustering, selection and optimization.
    pub window: usize,
    pub cluster_count: usize,
    pub risk_free_rate: f64,
    /// Annualization frequency for selection and optimization.
    pub trading_days_per_year: usize,
    pub weight_bounds: WeightBounds,
    /// Optimized weights below this are cleaned to zero.
    pub weight_cutoff: f64,
    pub correlation_basis: CorrelationBasis,
    pub solver: SolverSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: 252,
            cluster_count: 10,
            risk_free_rate: 0.02,
            trading_days_per_year: 252,
            weight_bounds: WeightBounds::default(),
            weight_cutoff: 1e-4,
            correlation_basis: CorrelationBasis::Prices,
            solver: SolverSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config invariants.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(Error::InvalidConfig("window must be > 0".into()));
        }
        if self.cluster_count == 0 {
            return Err(Error::InvalidConfig("cluster_count must be > 0".into()));
        }
        if self.trading_days_per_year == 0 {
            return Err(Error::InvalidConfig(
                "trading_days_per_year must be > 0".into(),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(Error::InvalidConfig("risk_free_rate must be finite".into()));
        }
        let WeightBounds { lower, upper } = self.weight_bounds;
        if !(lower.is_finite() && upper.is_finite()) || lower < 0.0 || lower > upper || upper > 1.0
        {
            return Err(Error::InvalidConfig(format!(
                "weight bounds must satisfy 0 <= lower <= upper <= 1, got [{lower}, {upper}]"
            )));
        }
        if !(self.weight_cutoff > 0.0 && self.weight_cutoff < 1.0) {
            return Err(Error::InvalidConfig(
                "weight_cutoff must be in (0.0, 1.0)".into(),
            ));
        }
        if self.solver.max_iterations == 0 || !(self.solver.tolerance > 0.0) {
            return Err(Error::InvalidConfig(
                "solver needs max_iterations > 0 and tolerance > 0".into(),
            ));
        }
        Ok(())
    }
}

/// How far back the price history reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InvestmentHorizon {
    /// Less than a year.
    Short,
    /// One to three years.
    Medium,
    /// More than three years.
    Long,
}

impl InvestmentHorizon {
    /// Years of price history requested for this horizon.
    pub fn years(self) -> u32 {
        match self {
            InvestmentHorizon::Short => 1,
            InvestmentHorizon::Medium => 3,
            InvestmentHorizon::Long => 5,
        }
    }
}

impl fmt::Display for InvestmentHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvestmentHorizon::Short => write!(f, "less than 1 year"),
            InvestmentHorizon::Medium => write!(f, "1-3 years"),
            InvestmentHorizon::Long => write!(f, "more than 3 years"),
        }
    }
}

impl FromStr for InvestmentHorizon {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" | "<1y" => Ok(InvestmentHorizon::Short),
            "medium" | "1-3y" => Ok(InvestmentHorizon::Medium),
            "long" | ">3y" => Ok(InvestmentHorizon::Long),
            other => Err(Error::InvalidConfig(format!(
                "unknown horizon '{other}' (expected short, medium or long)"
            ))),
        }
    }
}
