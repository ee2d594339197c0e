//! Bounded long-only max-Sharpe optimization.
//!
//! The solver is a pluggable [`SharpeSolver`]. The bundled
//! [`ProjectedGradient`] solver is deterministic:
//! - every iterate is projected onto `{w : sum(w) = 1, lower <= w <= upper}`,
//! - steps are accepted only if the Sharpe ratio does not decrease,
//! - the output is finite, within bounds, and sums to 1.

use log::debug;

use crate::config::{PipelineConfig, SolverSettings, WeightBounds};
use crate::data::PriceMatrix;
use crate::error::{Error, Result, Stage};
use crate::selector::Portfolio;
use crate::stats::{self, dot, mat_vec_mul};

/// Target weight per candidate, in portfolio order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightVector {
    entries: Vec<(String, f64)>,
}

impl WeightVector {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.entries.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, w)| *w).collect()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with a strictly positive weight.
    pub fn nonzero(&self) -> impl Iterator<Item = (&str, f64)> {
        self.iter().filter(|(_, w)| *w > 0.0)
    }
}

/// A max-Sharpe solver over annualized inputs.
pub trait SharpeSolver {
    /// Weights maximizing `(w·mu - rf) / sqrt(w'Σw)` with `sum(w) = 1` and
    /// every weight inside `bounds`.
    fn solve_max_sharpe(
        &self,
        expected_returns: &[f64],
        covariance: &[Vec<f64>],
        bounds: WeightBounds,
        risk_free_rate: f64,
    ) -> Result<Vec<f64>>;
}

/// Projected gradient ascent with backtracking on the Sharpe ratio.
///
/// The ascent starts from the portfolio with the largest excess return the
/// bounds allow. Steps never lower the Sharpe ratio, so every iterate keeps a
/// positive excess return. On that region the Sharpe ratio is pseudo-concave
/// and a stationary point of the projected iteration is the global maximum
/// over the feasible box-simplex.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectedGradient {
    pub settings: SolverSettings,
}

impl ProjectedGradient {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }
}

impl SharpeSolver for ProjectedGradient {
    fn solve_max_sharpe(
        &self,
        expected_returns: &[f64],
        covariance: &[Vec<f64>],
        bounds: WeightBounds,
        risk_free_rate: f64,
    ) -> Result<Vec<f64>> {
        let n = expected_returns.len();
        if n == 0 || covariance.len() != n || covariance.iter().any(|row| row.len() != n) {
            return Err(Error::insufficient(
                Stage::Optimization,
                format!("{n} expected returns do not match the covariance shape"),
            ));
        }
        if !bounds.admits(n) {
            return Err(Error::InfeasibleOptimization {
                assets: n,
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }

        let excess: Vec<f64> = expected_returns.iter().map(|m| m - risk_free_rate).collect();
        let start = max_excess_portfolio(&excess, bounds);
        if !(dot(&start, &excess) > 0.0) {
            return Err(Error::NoExcessReturn { risk_free_rate });
        }
        let sharpe = |w: &[f64]| {
            let var = stats::quadratic_form(covariance, w).max(1e-18);
            dot(w, &excess) / var.sqrt()
        };

        let mut w = start;
        let mut current = sharpe(&w);
        let mut lr = 1.0_f64;
        let mut iterations = 0;

        for _ in 0..self.settings.max_iterations {
            iterations += 1;
            let sigma_w = mat_vec_mul(covariance, &w);
            let var = dot(&w, &sigma_w).max(1e-18);
            let vol = var.sqrt();
            let num = dot(&w, &excess);

            let grad: Vec<f64> = excess
                .iter()
                .zip(&sigma_w)
                .map(|(a, sw)| a / vol - num * sw / (var * vol))
                .collect();

            // Backtrack until the projected step does not lose Sharpe.
            let mut accepted = None;
            while lr > 1e-14 {
                let candidate: Vec<f64> =
                    w.iter().zip(&grad).map(|(wi, gi)| wi + lr * gi).collect();
                let projected = project_box_simplex(&candidate, bounds);
                let value = sharpe(&projected);
                if value >= current {
                    accepted = Some((projected, value));
                    break;
                }
                lr *= 0.5;
            }

            let Some((next, value)) = accepted else {
                break;
            };
            let moved = squared_distance(&next, &w);
            w = next;
            current = value;
            if moved < self.settings.tolerance {
                break;
            }
            lr = (lr * 2.0).min(1e6);
        }

        debug!("max-sharpe: {iterations} iterations, sharpe {current:.6}");
        Ok(w)
    }
}

/// Optimizes candidate weights from a windowed price matrix.
pub struct WeightOptimizer<S = ProjectedGradient> {
    solver: S,
    bounds: WeightBounds,
    risk_free_rate: f64,
    frequency: f64,
    cutoff: f64,
}

impl WeightOptimizer<ProjectedGradient> {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_solver(ProjectedGradient::new(config.solver), config)
    }
}

impl<S: SharpeSolver> WeightOptimizer<S> {
    pub fn with_solver(solver: S, config: &PipelineConfig) -> Self {
        Self {
            solver,
            bounds: config.weight_bounds,
            risk_free_rate: config.risk_free_rate,
            frequency: config.trading_days_per_year as f64,
            cutoff: config.weight_cutoff,
        }
    }

    /// Max-Sharpe weights over the portfolio's columns of `prices`.
    pub fn optimize(&self, prices: &PriceMatrix, portfolio: &Portfolio) -> Result<WeightVector> {
        let prices = prices.select(portfolio.tickers())?;
        let returns = prices.returns();
        if returns.len() < 2 {
            return Err(Error::insufficient(
                Stage::Optimization,
                format!("need at least 3 price rows, got {}", prices.n_rows()),
            ));
        }
        let mu = stats::expected_returns(&returns, self.frequency);
        let sigma = stats::sample_cov(&returns, self.frequency);

        let raw = self
            .solver
            .solve_max_sharpe(&mu, &sigma, self.bounds, self.risk_free_rate)?;
        let weights = clean_weights(&raw, self.bounds, self.cutoff);

        Ok(WeightVector::new(
            portfolio.tickers().iter().cloned().zip(weights).collect(),
        ))
    }
}

/// Zero out weights below `cutoff` and hand their mass to the remaining
/// weights with headroom under the upper bound.
///
/// Returns the input unchanged when the bounds forbid zero weights or the
/// remaining weights cannot absorb the removed mass.
pub fn clean_weights(w: &[f64], bounds: WeightBounds, cutoff: f64) -> Vec<f64> {
    if bounds.lower > 0.0 {
        return w.to_vec();
    }

    let mut out: Vec<f64> = w
        .iter()
        .map(|&x| if x.abs() < cutoff { 0.0 } else { x })
        .collect();

    let mut residual = 1.0 - out.iter().sum::<f64>();
    for _ in 0..out.len() {
        if residual.abs() <= 1e-15 {
            break;
        }
        let free: Vec<usize> = (0..out.len())
            .filter(|&i| out[i] > 0.0 && out[i] < bounds.upper)
            .collect();
        let base: f64 = free.iter().map(|&i| out[i]).sum();
        if free.is_empty() || base <= 0.0 {
            return w.to_vec();
        }
        for &i in &free {
            out[i] = (out[i] + residual * out[i] / base).clamp(0.0, bounds.upper);
        }
        residual = 1.0 - out.iter().sum::<f64>();
    }

    if residual.abs() > 1e-9 {
        return w.to_vec();
    }
    out
}

/// Euclidean projection onto `{w : sum(w) = 1, lower <= w_i <= upper}`.
///
/// Bisects the shift `theta` in `w_i = clamp(v_i - theta, lower, upper)`.
/// The caller guarantees the set is non-empty.
pub fn project_box_simplex(v: &[f64], bounds: WeightBounds) -> Vec<f64> {
    let WeightBounds { lower, upper } = bounds;
    let shifted_sum = |theta: f64| -> f64 { v.iter().map(|x| (x - theta).clamp(lower, upper)).sum() };

    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = v.iter().copied().fold(f64::INFINITY, f64::min);
    // At `lo` every weight sits at `upper`, at `hi` every weight at `lower`.
    let mut lo = min - upper;
    let mut hi = max - lower;

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if shifted_sum(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            break;
        }
    }

    let theta = 0.5 * (lo + hi);
    let mut w: Vec<f64> = v.iter().map(|x| (x - theta).clamp(lower, upper)).collect();

    // Put the bisection's rounding residue on a free coordinate.
    let residual = 1.0 - w.iter().sum::<f64>();
    if let Some(i) = (0..w.len()).find(|&i| {
        let x = w[i] + residual;
        w[i] > lower && w[i] < upper && x >= lower && x <= upper
    }) {
        w[i] += residual;
    }
    w
}

/// Feasible weights with the largest `w . excess`: everything at the lower
/// bound, then the best excess returns filled up to the upper bound.
fn max_excess_portfolio(excess: &[f64], bounds: WeightBounds) -> Vec<f64> {
    let mut w = vec![bounds.lower; excess.len()];
    let mut remaining = 1.0 - bounds.lower * excess.len() as f64;

    let mut order: Vec<usize> = (0..excess.len()).collect();
    order.sort_by(|&a, &b| excess[b].total_cmp(&excess[a]));
    for i in order {
        if remaining <= 0.0 {
            break;
        }
        let add = (bounds.upper - bounds.lower).min(remaining);
        w[i] += add;
        remaining -= add;
    }
    w
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_returns() -> Vec<Vec<f64>> {
        vec![
            vec![0.010, 0.004, -0.002, 0.006],
            vec![-0.003, 0.006, 0.001, -0.002],
            vec![0.007, -0.001, 0.002, 0.004],
            vec![0.004, 0.003, -0.004, 0.005],
            vec![-0.002, 0.005, 0.003, -0.001],
            vec![0.006, -0.002, 0.001, 0.003],
            vec![0.003, 0.004, -0.001, 0.002],
            vec![-0.001, 0.002, 0.002, -0.003],
            vec![0.005, 0.001, -0.002, 0.004],
            vec![0.002, 0.003, 0.001, 0.000],
            vec![-0.004, 0.002, 0.003, -0.002],
            vec![0.006, -0.001, 0.000, 0.005],
        ]
    }

    fn assert_valid_weights(w: &[f64], n: usize, bounds: WeightBounds) {
        assert_eq!(w.len(), n);
        assert!(w.iter().all(|x| x.is_finite() && bounds.contains(*x, 1e-12)), "{w:?}");
        let s: f64 = w.iter().sum();
        assert!((s - 1.0).abs() < 1e-9, "sum={s}");
    }

    fn solve(bounds: WeightBounds, rf: f64) -> Result<Vec<f64>> {
        let r = sample_returns();
        let mu = stats::expected_returns(&r, 252.0);
        let cov = stats::sample_cov(&r, 252.0);
        ProjectedGradient::default().solve_max_sharpe(&mu, &cov, bounds, rf)
    }

    fn sharpe_of(w: &[f64], rf: f64) -> f64 {
        let r = sample_returns();
        let mu = stats::expected_returns(&r, 252.0);
        let cov = stats::sample_cov(&r, 252.0);
        (dot(w, &mu) - rf) / stats::quadratic_form(&cov, w).sqrt()
    }

    #[test]
    fn max_sharpe_weights_are_valid() {
        let bounds = WeightBounds::new(0.0, 1.0);
        let w = solve(bounds, 0.02).unwrap();
        assert_valid_weights(&w, 4, bounds);
    }

    #[test]
    fn upper_bound_is_respected() {
        let bounds = WeightBounds::new(0.0, 0.3);
        let w = solve(bounds, 0.02).unwrap();
        assert_valid_weights(&w, 4, bounds);
    }

    #[test]
    fn optimum_beats_equal_weight_and_vertices() {
        let bounds = WeightBounds::new(0.0, 1.0);
        let w = solve(bounds, 0.02).unwrap();
        let best = sharpe_of(&w, 0.02);
        assert!(best >= sharpe_of(&[0.25; 4], 0.02) - 1e-9);
        for i in 0..4 {
            let mut e = vec![0.0; 4];
            e[i] = 1.0;
            assert!(best >= sharpe_of(&e, 0.02) - 1e-9);
        }
    }

    #[test]
    fn infeasible_bounds() {
        let err = solve(WeightBounds::new(0.0, 0.2), 0.02).unwrap_err();
        assert!(matches!(err, Error::InfeasibleOptimization { assets: 4, .. }));
        let err = solve(WeightBounds::new(0.3, 1.0), 0.02).unwrap_err();
        assert!(matches!(err, Error::InfeasibleOptimization { .. }));
    }

    #[test]
    fn no_asset_beats_risk_free() {
        let err = solve(WeightBounds::new(0.0, 1.0), 100.0).unwrap_err();
        assert!(matches!(err, Error::NoExcessReturn { .. }));
    }

    #[test]
    fn bounds_can_rule_out_excess_return() {
        // Only the first asset beats the risk-free rate, but the cap forces
        // 80% of the weight into the losers.
        let mu = [0.10, -0.3, -0.3, -0.3, -0.3];
        let cov: Vec<Vec<f64>> = (0..5)
            .map(|i| (0..5).map(|j| if i == j { 0.04 } else { 0.0 }).collect())
            .collect();
        let err = ProjectedGradient::default()
            .solve_max_sharpe(&mu, &cov, WeightBounds::new(0.0, 0.2), 0.02)
            .unwrap_err();
        assert!(matches!(err, Error::NoExcessReturn { .. }));
    }

    #[test]
    fn negative_excess_equal_weight_start_still_finds_optimum() {
        // Equal weights have negative excess return here; the hedge in the
        // second asset costs far more return than it saves in volatility.
        let mu = [0.0349, -0.3997];
        let cov = vec![vec![0.04, -0.03], vec![-0.03, 0.09]];
        let bounds = WeightBounds::new(0.0, 1.0);
        let w = ProjectedGradient::default()
            .solve_max_sharpe(&mu, &cov, bounds, 0.02)
            .unwrap();
        assert_valid_weights(&w, 2, bounds);
        assert!(w[0] > 0.999, "{w:?}");

        let excess = [mu[0] - 0.02, mu[1] - 0.02];
        let sharpe = dot(&w, &excess) / stats::quadratic_form(&cov, &w).sqrt();
        assert!(sharpe > 0.0);
    }

    #[test]
    fn max_excess_portfolio_fills_best_first() {
        let w = max_excess_portfolio(&[0.01, 0.05, -0.02, 0.03], WeightBounds::new(0.1, 0.4));
        for (got, want) in w.iter().zip([0.1, 0.4, 0.1, 0.4]) {
            assert!((got - want).abs() < 1e-12, "{w:?}");
        }
    }

    #[test]
    fn single_asset_takes_everything() {
        let w = ProjectedGradient::default()
            .solve_max_sharpe(&[0.1], &[vec![0.04]], WeightBounds::new(0.0, 1.0), 0.02)
            .unwrap();
        assert_eq!(w.len(), 1);
        assert!((w[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn projection_lands_in_feasible_set() {
        let bounds = WeightBounds::new(0.05, 0.4);
        for v in [
            vec![3.0, -2.0, 0.5, 0.1],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![1e6, 1e6, -1e6, 0.0],
        ] {
            let w = project_box_simplex(&v, bounds);
            assert_valid_weights(&w, 4, bounds);
        }
    }

    #[test]
    fn projection_keeps_feasible_points() {
        let bounds = WeightBounds::new(0.0, 0.5);
        let v = vec![0.1, 0.2, 0.3, 0.4];
        let w = project_box_simplex(&v, bounds);
        for (a, b) in v.iter().zip(&w) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn clean_weights_zeroes_dust_and_renormalizes() {
        let bounds = WeightBounds::new(0.0, 0.5);
        let w = clean_weights(&[0.00005, 0.49995, 0.3, 0.2], bounds, 1e-4);
        assert_eq!(w[0], 0.0);
        assert_valid_weights(&w, 4, bounds);
        assert!(w[1] <= 0.5);
    }

    #[test]
    fn clean_weights_respects_positive_lower_bound() {
        let bounds = WeightBounds::new(0.00001, 1.0);
        let raw = [0.00005, 0.99995];
        assert_eq!(clean_weights(&raw, bounds, 1e-4), raw.to_vec());
    }

    #[test]
    fn clean_weights_fills_up_to_upper_bound() {
        let bounds = WeightBounds::new(0.0, 0.5);
        let w = clean_weights(&[0.00005, 0.5, 0.49995], bounds, 1e-4);
        assert_eq!(w[0], 0.0);
        assert_valid_weights(&w, 3, bounds);
    }

    #[test]
    fn clean_weights_keeps_input_when_mass_cannot_move() {
        // Both survivors already sit at the upper bound.
        let bounds = WeightBounds::new(0.0, 0.4);
        let raw = [0.2, 0.4, 0.4];
        assert_eq!(clean_weights(&raw, bounds, 0.25), raw.to_vec());
    }

    #[test]
    fn weight_vector_accessors() {
        let wv = WeightVector::new(vec![("A".into(), 0.7), ("B".into(), 0.0), ("C".into(), 0.3)]);
        assert_eq!(wv.get("C"), Some(0.3));
        assert_eq!(wv.get("Z"), None);
        assert!((wv.sum() - 1.0).abs() < 1e-12);
        assert_eq!(wv.nonzero().count(), 2);
    }
}
