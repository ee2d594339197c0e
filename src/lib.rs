//! # clusterfolio
//!
//! Clustering-based portfolio construction from daily price histories.
//!
//! ## Pipeline
//!
//! 1. **Dissimilarity**: correlation distance `sqrt(2 (1 - corr))` between
//!    every pair of instruments over the trailing window.
//! 2. **Clustering**: agglomerative Ward linkage, cut into `k` clusters.
//! 3. **Selection**: the highest-Sharpe member of each cluster becomes a
//!    candidate.
//! 4. **Optimization**: long-only max-Sharpe weights within per-asset bounds.
//! 5. **Allocation**: whole shares for a cash budget, greedy two-pass.
//! 6. **Statistics**: expected return, volatility, Sharpe ratio and beta
//!    against a benchmark index.
//!
//! Every stage is a plain function or engine over owned data, so stages can
//! be used on their own:
//!
//! ```
//! use clusterfolio::{WeightVector, allocate};
//! use rustc_hash::FxHashMap;
//!
//! let weights = WeightVector::new(vec![("AAA".into(), 0.6), ("BBB".into(), 0.4)]);
//! let prices: FxHashMap<String, f64> =
//!     [("AAA".to_string(), 60.0), ("BBB".to_string(), 40.0)].into_iter().collect();
//!
//! let result = allocate(&weights, &prices, 1_000).unwrap();
//! assert_eq!(result.shares_of("AAA"), 10);
//! assert_eq!(result.shares_of("BBB"), 10);
//! assert_eq!(result.leftover, 0.0);
//! ```
//!
//! ## Horizons
//!
//! A run loads `years` of history through a [`PriceSource`]. Clustering,
//! selection and optimization use the trailing [`PipelineConfig::window`]
//! rows; allocation and the final statistics use the whole history.
//!
//! ```
//! use clusterfolio::InvestmentHorizon;
//!
//! let horizon: InvestmentHorizon = "1-3y".parse().unwrap();
//! assert_eq!(horizon, InvestmentHorizon::Medium);
//! assert_eq!(horizon.years(), 3);
//! ```
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` on data, config and report types.
//! - `parallel`: per-instrument risk/return computed with rayon.

pub mod allocation;
pub mod cluster;
pub mod config;
pub mod data;
pub mod dissimilarity;
mod error;
pub mod optimize;
pub mod pipeline;
pub mod report;
pub mod risk_return;
pub mod selector;
pub mod stats;

// Re-export public API
pub use allocation::{AllocationResult, allocate};
pub use cluster::{ClusterAssignment, ClusterEngine, Merge};
pub use config::{CorrelationBasis, InvestmentHorizon, PipelineConfig, SolverSettings, WeightBounds};
pub use data::{BenchmarkSeries, PriceDataset, PriceMatrix, PriceSource};
pub use dissimilarity::{DissimilarityEngine, DissimilarityMatrix};
pub use error::{Error, Result, Stage};
pub use optimize::{ProjectedGradient, SharpeSolver, WeightOptimizer, WeightVector};
pub use pipeline::Pipeline;
pub use report::{HoldingLine, Performance, PortfolioReport, ReportSummary, StatsReporter};
pub use risk_return::{RiskReturnEngine, RiskReturnRecord};
pub use selector::{Portfolio, select_portfolio};
