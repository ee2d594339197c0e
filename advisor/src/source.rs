//! Local JSON price file implementing [`PriceSource`].
//!
//! ```json
//! {
//!   "dates": ["2024-01-02", "2024-01-03"],
//!   "benchmark": { "ticker": "^GSPC", "closes": [4742.83, 4704.81] },
//!   "instruments": [
//!     { "ticker": "AAPL",  "closes": [185.64, 184.25] },
//!     { "ticker": "BRK.B", "closes": [357.94, null] }
//!   ]
//! }
//! ```
//!
//! Every series has one entry per date; `null` marks a missing close.

use std::path::Path;

use chrono::{Months, NaiveDate};
use clusterfolio::{BenchmarkSeries, PriceDataset, PriceMatrix, PriceSource};
use log::{info, warn};
use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Parsed price file.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceFile {
    pub dates: Vec<NaiveDate>,
    pub benchmark: Series,
    pub instruments: Vec<Series>,
}

/// One ticker's closes, aligned with [`PriceFile::dates`].
#[derive(Debug, Clone, Deserialize)]
pub struct Series {
    pub ticker: String,
    pub closes: Vec<Option<f64>>,
}

/// Upper-case and use `-` as the share class separator (`brk.b` -> `BRK-B`).
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace('.', "-")
}

/// Price history read from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonPriceSource {
    file: PriceFile,
}

impl JsonPriceSource {
    /// Read and parse a price file.
    pub fn open(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::DataRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let file: PriceFile = serde_json::from_str(json)?;
        Self::from_file(file)
    }

    pub fn from_file(file: PriceFile) -> Result<Self> {
        let n = file.dates.len();
        if n == 0 {
            return Err(Error::Data("price file has no dates".into()));
        }
        let mut seen = FxHashSet::default();
        for series in std::iter::once(&file.benchmark).chain(&file.instruments) {
            if series.closes.len() != n {
                return Err(Error::Data(format!(
                    "{} has {} closes for {n} dates",
                    series.ticker,
                    series.closes.len()
                )));
            }
        }
        for series in &file.instruments {
            let ticker = normalize_ticker(&series.ticker);
            if ticker.is_empty() {
                return Err(Error::Data("empty ticker".into()));
            }
            if !seen.insert(ticker.clone()) {
                return Err(Error::Data(format!("duplicate ticker: {ticker}")));
            }
        }
        Ok(Self { file })
    }

    /// Dataset covering the last `years` years of the file.
    pub fn dataset(&self, years: u32) -> Result<PriceDataset> {
        let dates = &self.file.dates;
        let start = match dates
            .last()
            .and_then(|last| last.checked_sub_months(Months::new(12 * years)))
        {
            Some(cutoff) => dates.partition_point(|d| *d < cutoff),
            None => 0,
        };
        let horizon = &dates[start..];

        let mut tickers = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        for series in &self.file.instruments {
            let closes: Option<Vec<f64>> = series.closes[start..].iter().copied().collect();
            match closes {
                Some(closes) => {
                    tickers.push(normalize_ticker(&series.ticker));
                    columns.push(closes);
                }
                None => warn!("dropping {}: missing closes in the last {years}y", series.ticker),
            }
        }
        if tickers.is_empty() {
            return Err(Error::Data(format!(
                "no instrument has complete closes in the last {years}y"
            )));
        }

        let rows = (0..horizon.len())
            .map(|r| columns.iter().map(|c| c[r]).collect())
            .collect();
        let prices = PriceMatrix::new(horizon.to_vec(), tickers, rows)?;

        let (bench_dates, bench_closes): (Vec<NaiveDate>, Vec<f64>) = horizon
            .iter()
            .zip(&self.file.benchmark.closes[start..])
            .filter_map(|(d, c)| c.map(|c| (*d, c)))
            .unzip();
        let benchmark =
            BenchmarkSeries::new(self.file.benchmark.ticker.clone(), bench_dates, bench_closes)?;

        info!(
            "loaded {} instruments over {} dates ({} to {})",
            prices.n_instruments(),
            prices.n_rows(),
            horizon[0],
            horizon[horizon.len() - 1]
        );
        Ok(PriceDataset::new(prices, benchmark))
    }
}

impl PriceSource for JsonPriceSource {
    fn load(&self, window_years: u32) -> clusterfolio::Result<PriceDataset> {
        self.dataset(window_years).map_err(|e| match e {
            Error::Pipeline(inner) => inner,
            other => clusterfolio::Error::from_source(other),
        })
    }
}
