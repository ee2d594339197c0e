//! End-to-end portfolio construction.
//!
//! Stage order: window, risk/return, dissimilarity, clustering, selection,
//! optimization, allocation, statistics. The first failing stage ends the run.
//! Every run owns its intermediate state, so one [`Pipeline`] can serve
//! concurrent requests.

use log::{info, warn};

use crate::allocation;
use crate::cluster::ClusterEngine;
use crate::config::PipelineConfig;
use crate::data::{PriceDataset, PriceMatrix, PriceSource};
use crate::dissimilarity::DissimilarityEngine;
use crate::error::{Error, Result, Stage};
use crate::optimize::{ProjectedGradient, SharpeSolver, WeightOptimizer};
use crate::report::{PortfolioReport, StatsReporter};
use crate::risk_return::RiskReturnEngine;
use crate::selector;

/// Fewest price rows that still give two returns.
const MIN_ROWS: usize = 3;

/// Clustering-based portfolio builder.
///
/// ```
/// use clusterfolio::{Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
/// assert_eq!(pipeline.config().cluster_count, 10);
/// ```
pub struct Pipeline<S = ProjectedGradient> {
    config: PipelineConfig,
    optimizer: WeightOptimizer<S>,
}

impl Pipeline<ProjectedGradient> {
    /// Validates `config` and uses the default max-Sharpe solver.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = WeightOptimizer::from_config(&config);
        Ok(Self { config, optimizer })
    }
}

impl<S: SharpeSolver> Pipeline<S> {
    /// Same as [`Pipeline::new`] with a custom solver.
    pub fn with_solver(config: PipelineConfig, solver: S) -> Result<Self> {
        config.validate()?;
        let optimizer = WeightOptimizer::with_solver(solver, &config);
        Ok(Self { config, optimizer })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load `window_years` of history from `source` and build a portfolio.
    pub fn build_portfolio<P: PriceSource + ?Sized>(
        &self,
        source: &P,
        budget: u64,
        window_years: u32,
    ) -> Result<PortfolioReport> {
        if window_years == 0 {
            return Err(Error::InvalidConfig("window years must be > 0".into()));
        }
        check_budget(budget)?;
        let dataset = source.load(window_years)?;
        self.run(&dataset, budget)
    }

    /// Build a portfolio from an already loaded dataset.
    pub fn run(&self, dataset: &PriceDataset, budget: u64) -> Result<PortfolioReport> {
        check_budget(budget)?;
        let full = &dataset.prices;
        info!(
            "pipeline: {} instruments, {} rows, budget {budget}",
            full.n_instruments(),
            full.n_rows()
        );

        let window = self.window(full)?;

        let records = RiskReturnEngine::new(
            self.config.risk_free_rate,
            self.config.trading_days_per_year as f64,
        )
        .compute(&window)?;

        let dissimilarity = DissimilarityEngine::new(self.config.correlation_basis).compute(&window)?;

        let clusters = ClusterEngine::new(self.config.cluster_count).fit(&dissimilarity)?;
        let sizes: Vec<usize> = clusters.iter().map(|(_, m)| m.len()).collect();
        info!("clustering: {} clusters, sizes {sizes:?}", clusters.len());

        let portfolio = selector::select_portfolio(&clusters, &records)?;
        info!("selection: {:?}", portfolio.tickers());

        let weights = self.optimizer.optimize(&window, &portfolio)?;
        info!(
            "optimization: {} of {} candidates weighted",
            weights.nonzero().count(),
            weights.len()
        );

        let allocation = allocation::allocate(&weights, &full.latest_prices(), budget)?;
        info!(
            "allocation: {} shares, leftover {:.2}",
            allocation.total_shares(),
            allocation.leftover
        );

        StatsReporter::new(self.config.risk_free_rate).report(
            full,
            &dataset.benchmark,
            clusters,
            portfolio,
            weights,
            allocation,
        )
    }

    /// The trailing `window` rows, or all rows when history is shorter.
    fn window(&self, prices: &PriceMatrix) -> Result<PriceMatrix> {
        let rows = prices.n_rows();
        if rows < MIN_ROWS {
            return Err(Error::insufficient(
                Stage::Window,
                format!("need at least {MIN_ROWS} price rows, got {rows}"),
            ));
        }
        if rows < self.config.window {
            warn!(
                "only {rows} rows of history, window wants {}; using all rows",
                self.config.window
            );
        }
        Ok(prices.trailing(self.config.window))
    }
}

fn check_budget(budget: u64) -> Result<()> {
    if budget == 0 {
        return Err(Error::InvalidConfig("budget must be > 0".into()));
    }
    Ok(())
}
