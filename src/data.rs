//! Price data consumed by the pipeline.
//!
//! A [`PriceMatrix`] is a read-only snapshot: rows are dates in ascending
//! order, columns are instruments. Stages never mutate it; they take trailing
//! windows or column subsets as new matrices.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result, Stage};

/// Adjusted closing prices, one row per date, one column per instrument.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl PriceMatrix {
    /// Build a matrix, checking shape, ordering and values.
    ///
    /// Dates must be strictly ascending, tickers unique, and every price
    /// finite and positive.
    pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if dates.len() != rows.len() {
            return Err(Error::insufficient(
                Stage::Window,
                format!("{} dates for {} rows", dates.len(), rows.len()),
            ));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidConfig(
                "price dates must be strictly ascending".into(),
            ));
        }
        let mut seen = FxHashMap::default();
        for (i, t) in tickers.iter().enumerate() {
            if seen.insert(t.as_str(), i).is_some() {
                return Err(Error::InvalidConfig(format!("duplicate instrument {t}")));
            }
        }
        for row in &rows {
            if row.len() != tickers.len() {
                return Err(Error::insufficient(
                    Stage::Window,
                    format!("row has {} prices for {} instruments", row.len(), tickers.len()),
                ));
            }
            for (j, &p) in row.iter().enumerate() {
                if !(p.is_finite() && p > 0.0) {
                    return Err(Error::InvalidPrice {
                        stage: Stage::Window,
                        instrument: tickers[j].clone(),
                        price: p,
                    });
                }
            }
        }
        Ok(Self {
            dates,
            tickers,
            rows,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_instruments(&self) -> usize {
        self.tickers.len()
    }

    pub fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Price series of one instrument.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[j]).collect()
    }

    /// Most recent price per instrument.
    pub fn latest_prices(&self) -> FxHashMap<String, f64> {
        match self.rows.last() {
            Some(row) => self
                .tickers
                .iter()
                .cloned()
                .zip(row.iter().copied())
                .collect(),
            None => FxHashMap::default(),
        }
    }

    /// The most recent `n` rows, or every row if fewer exist.
    pub fn trailing(&self, n: usize) -> PriceMatrix {
        let start = self.rows.len().saturating_sub(n);
        PriceMatrix {
            dates: self.dates[start..].to_vec(),
            tickers: self.tickers.clone(),
            rows: self.rows[start..].to_vec(),
        }
    }

    /// Restrict to the given instruments, in the given order.
    pub fn select(&self, tickers: &[String]) -> Result<PriceMatrix> {
        let idx = tickers
            .iter()
            .map(|t| {
                self.index_of(t).ok_or_else(|| {
                    Error::insufficient(Stage::Window, format!("unknown instrument {t}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PriceMatrix {
            dates: self.dates.clone(),
            tickers: tickers.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| idx.iter().map(|&j| row[j]).collect())
                .collect(),
        })
    }

    /// Daily simple returns, one row shorter than the price matrix.
    pub fn returns(&self) -> Vec<Vec<f64>> {
        self.rows
            .windows(2)
            .map(|w| w[1].iter().zip(&w[0]).map(|(p1, p0)| p1 / p0 - 1.0).collect())
            .collect()
    }
}

/// Closing values of a market index.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BenchmarkSeries {
    pub name: String,
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl BenchmarkSeries {
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, closes: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if dates.len() != closes.len() {
            return Err(Error::insufficient(
                Stage::Statistics,
                format!("benchmark has {} dates for {} closes", dates.len(), closes.len()),
            ));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidConfig(
                "benchmark dates must be strictly ascending".into(),
            ));
        }
        if let Some(&bad) = closes.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
            return Err(Error::InvalidPrice {
                stage: Stage::Statistics,
                instrument: name,
                price: bad,
            });
        }
        Ok(Self {
            name,
            dates,
            closes,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Close on `date`, if the index traded that day.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.closes[i])
    }
}

/// Everything one run needs: the instrument universe and its benchmark.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceDataset {
    pub prices: PriceMatrix,
    pub benchmark: BenchmarkSeries,
}

impl PriceDataset {
    pub fn new(prices: PriceMatrix, benchmark: BenchmarkSeries) -> Self {
        Self { prices, benchmark }
    }
}

/// Supplier of price history, e.g. a file loader or a market-data client.
///
/// Implementations return an owned dataset so concurrent runs never share
/// intermediate state.
pub trait PriceSource {
    /// Load `window_years` of history ending at the most recent close.
    fn load(&self, window_years: u32) -> Result<PriceDataset>;
}

/// An already loaded dataset is its own source; the horizon is ignored.
impl PriceSource for PriceDataset {
    fn load(&self, _window_years: u32) -> Result<PriceDataset> {
        Ok(self.clone())
    }
}
