//! One advisor run: load config-driven inputs and build the portfolio.

use clusterfolio::{InvestmentHorizon, Pipeline, PortfolioReport};
use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::source::JsonPriceSource;

/// Build a portfolio for `budget` over `horizon` from the configured price file.
pub fn run(config: &Config, budget: u64, horizon: InvestmentHorizon) -> Result<PortfolioReport> {
    let pipeline = Pipeline::new(config.pipeline_config())?;
    let source = JsonPriceSource::open(&config.data.prices)?;
    info!(
        "building portfolio: budget {budget}, horizon {horizon} ({}y), prices {}",
        horizon.years(),
        config.data.prices.display()
    );
    Ok(pipeline.build_portfolio(&source, budget, horizon.years())?)
}
