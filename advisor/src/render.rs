//! Text and JSON output of a portfolio report.

use std::fmt;

use clusterfolio::{InvestmentHorizon, PortfolioReport, ReportSummary};

use crate::error::{Error, Result};

/// Human-readable report for the terminal.
pub fn render_text(summary: &ReportSummary, budget: u64, horizon: InvestmentHorizon) -> String {
    TextReport {
        summary,
        budget,
        horizon,
    }
    .to_string()
}

struct TextReport<'a> {
    summary: &'a ReportSummary,
    budget: u64,
    horizon: InvestmentHorizon,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary;
        writeln!(f, "Portfolio for {} over {}", self.budget, self.horizon)?;
        writeln!(f)?;
        if s.budget_too_small {
            writeln!(f, "Budget too small to buy a single share.")?;
        }
        for h in &s.holdings {
            writeln!(f, "  {:<8} {:>7.2}%  {:>6} shares", h.ticker, h.weight_pct, h.shares)?;
        }
        writeln!(f)?;
        writeln!(f, "  Leftover cash:    {:>10.2}", s.leftover)?;
        writeln!(f, "  Expected return:  {:>9.2}%", s.expected_return_pct)?;
        writeln!(f, "  Risk:             {:>9.2}%", s.volatility_pct)?;
        writeln!(f, "  Sharpe ratio:     {:>10.2}", s.sharpe_ratio)?;
        writeln!(f, "  Beta:             {:>10.2}", s.beta)
    }
}

/// The full report, unrounded, as pretty-printed JSON.
pub fn render_json(report: &PortfolioReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Error::Render)
}
