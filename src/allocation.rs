//! Greedy discrete allocation of whole shares.
//!
//! Two passes, like the usual greedy portfolio allocator:
//!
//! 1. In descending weight order, buy `floor(weight * budget / price)` shares,
//!    capped by what the remaining cash affords.
//! 2. Repeatedly buy one share of the affordable nonzero-weight instrument
//!    whose held value fraction is furthest below its target weight, until no
//!    such instrument is affordable.
//!
//! This approximates the targets; it is not an exact knapsack optimum. Each
//! purchase spends a strictly positive price, so the loop terminates, and no
//! share is ever bought with cash that is not there.

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result, Stage};
use crate::optimize::WeightVector;

/// Whole-share allocation and the cash left over.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocationResult {
    /// Shares per instrument, in weight-vector order. Zero-weight
    /// instruments are present with zero shares.
    pub shares: Vec<(String, u64)>,
    pub leftover: f64,
    /// The budget could not buy a single share of any nonzero-weight
    /// instrument.
    pub budget_too_small: bool,
}

impl AllocationResult {
    pub fn shares_of(&self, ticker: &str) -> u64 {
        self.shares
            .iter()
            .find(|(t, _)| t == ticker)
            .map_or(0, |(_, n)| *n)
    }

    /// Cash spent at the given prices.
    pub fn spent(&self, prices: &FxHashMap<String, f64>) -> f64 {
        self.shares
            .iter()
            .map(|(t, n)| *n as f64 * prices.get(t).copied().unwrap_or(0.0))
            .sum()
    }

    pub fn total_shares(&self) -> u64 {
        self.shares.iter().map(|(_, n)| n).sum()
    }
}

struct Slot<'a> {
    ticker: &'a str,
    weight: f64,
    price: f64,
    shares: u64,
}

/// Convert target weights into whole shares for a cash budget.
pub fn allocate(
    weights: &WeightVector,
    latest_prices: &FxHashMap<String, f64>,
    budget: u64,
) -> Result<AllocationResult> {
    let total = budget as f64;

    let mut slots = Vec::with_capacity(weights.len());
    for (ticker, weight) in weights.iter() {
        let price = latest_prices.get(ticker).copied().ok_or_else(|| {
            Error::insufficient(Stage::Allocation, format!("no latest price for {ticker}"))
        })?;
        if !(price.is_finite() && price > 0.0) {
            return Err(Error::InvalidPrice {
                stage: Stage::Allocation,
                instrument: ticker.to_string(),
                price,
            });
        }
        slots.push(Slot {
            ticker,
            weight,
            price,
            shares: 0,
        });
    }

    // Stable: equal weights keep weight-vector order.
    let mut order: Vec<usize> = (0..slots.len()).filter(|&i| slots[i].weight > 0.0).collect();
    order.sort_by(|&a, &b| slots[b].weight.total_cmp(&slots[a].weight));

    let mut spent = 0.0_f64;

    for &i in &order {
        let slot = &mut slots[i];
        let available = total - spent;
        let ideal = (slot.weight * total / slot.price).floor();
        let affordable = (available / slot.price).floor();
        let n = ideal.min(affordable).max(0.0) as u64;
        slot.shares = n;
        spent += n as f64 * slot.price;
    }

    loop {
        let available = total - spent;
        let pick = order
            .iter()
            .copied()
            .filter(|&i| slots[i].price <= available)
            .map(|i| {
                let held = slots[i].shares as f64 * slots[i].price / total;
                (i, slots[i].weight - held)
            })
            // Ties keep the earlier instrument in weight order.
            .fold(None, |best: Option<(usize, f64)>, (i, deficit)| match best {
                Some((_, d)) if d >= deficit => best,
                _ => Some((i, deficit)),
            });
        let Some((i, _)) = pick else {
            break;
        };
        slots[i].shares += 1;
        spent += slots[i].price;
    }

    let budget_too_small = !order.is_empty() && order.iter().all(|&i| slots[i].shares == 0);
    if budget_too_small {
        warn!("budget {budget} cannot buy a single share of any weighted instrument");
    }

    let leftover = (total - spent).max(0.0);
    debug!("allocation: spent {spent:.2} of {budget}, leftover {leftover:.2}");

    Ok(AllocationResult {
        shares: slots
            .iter()
            .map(|s| (s.ticker.to_string(), s.shares))
            .collect(),
        leftover,
        budget_too_small,
    })
}
