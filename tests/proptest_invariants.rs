//! Property-based tests for pipeline invariants.
//!
//! These tests use proptest to verify that projection, cleaning, max-Sharpe,
//! allocation, dissimilarity and clustering invariants hold across random
//! inputs.

use chrono::{Days, NaiveDate};
use clusterfolio::optimize::{clean_weights, project_box_simplex};
use clusterfolio::{
    ClusterEngine, CorrelationBasis, DissimilarityEngine, Error, PriceMatrix, ProjectedGradient,
    SharpeSolver, WeightBounds, WeightVector, allocate,
};
use proptest::prelude::*;
use rustc_hash::FxHashMap;

/// Feasible bounds for `n` weights: `n * lower <= 1 <= n * upper`.
fn bounds_strategy(n: usize) -> impl Strategy<Value = WeightBounds> {
    let n = n as f64;
    (0.0..=1.0f64, 0.0..=1.0f64).prop_map(move |(a, b)| {
        let lower = a / n;
        let upper = 1.0 / n + b * (1.0 - 1.0 / n);
        WeightBounds::new(lower, upper)
    })
}

/// Daily returns with magnitude at least 0.1%, so no price series is flat.
fn return_strategy() -> impl Strategy<Value = f64> {
    (0.001..0.05f64, any::<bool>()).prop_map(|(m, up)| if up { m } else { -m })
}

/// Price matrix of `instruments` columns and `rows` rows built from random returns.
fn price_matrix_strategy() -> impl Strategy<Value = PriceMatrix> {
    (2usize..9, 6usize..40).prop_flat_map(|(instruments, rows)| {
        prop::collection::vec(prop::collection::vec(return_strategy(), instruments), rows - 1)
            .prop_map(move |returns| {
                let mut level = vec![100.0; instruments];
                let mut prices = vec![level.clone()];
                for r in &returns {
                    for (p, x) in level.iter_mut().zip(r) {
                        *p *= 1.0 + x;
                    }
                    prices.push(level.clone());
                }
                let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
                let dates = (0..rows).map(|d| start + Days::new(d as u64)).collect();
                let tickers = (0..instruments).map(|i| format!("T{i}")).collect();
                PriceMatrix::new(dates, tickers, prices).unwrap()
            })
    })
}

/// Expected returns, a covariance `A'A + 0.01 I` whose off-diagonal terms
/// take either sign, and a batch of raw vectors to project into the bounds.
fn solver_case_strategy() -> impl Strategy<Value = (Vec<f64>, Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    (2usize..6).prop_flat_map(|n| {
        (
            prop::collection::vec(-0.5..0.5f64, n),
            prop::collection::vec(prop::collection::vec(-0.4..0.4f64, n), n),
            prop::collection::vec(prop::collection::vec(-2.0..2.0f64, n), 64),
        )
            .prop_map(move |(mu, a, raw)| {
                let cov: Vec<Vec<f64>> = (0..n)
                    .map(|i| {
                        (0..n)
                            .map(|j| {
                                let aa: f64 = a.iter().map(|row| row[i] * row[j]).sum();
                                if i == j { aa + 0.01 } else { aa }
                            })
                            .collect::<Vec<f64>>()
                    })
                    .collect();
                (mu, cov, raw)
            })
    })
}

fn sharpe_ratio(w: &[f64], mu: &[f64], cov: &[Vec<f64>], rf: f64) -> f64 {
    let ret: f64 = w.iter().zip(mu).map(|(a, b)| a * b).sum();
    let var: f64 = (0..w.len())
        .map(|i| (0..w.len()).map(|j| w[i] * cov[i][j] * w[j]).sum::<f64>())
        .sum();
    (ret - rf) / var.sqrt()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // WEIGHT INVARIANTS
    // ========================================================================

    /// Projection lands inside the box and on the simplex.
    #[test]
    fn projection_is_feasible(
        (v, bounds) in (1usize..12).prop_flat_map(|n| {
            (prop::collection::vec(-3.0..3.0f64, n), bounds_strategy(n))
        })
    ) {
        let w = project_box_simplex(&v, bounds);
        let sum: f64 = w.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9, "sum {}", sum);
        for x in &w {
            prop_assert!(bounds.contains(*x, 1e-9), "{} outside {:?}", x, bounds);
        }
    }

    /// Cleaning keeps the simplex and the bounds.
    #[test]
    fn cleaning_keeps_feasibility(
        (v, bounds) in (2usize..12).prop_flat_map(|n| {
            (prop::collection::vec(-1.0..1.0f64, n), bounds_strategy(n))
        }),
        cutoff in 1e-6..0.05f64,
    ) {
        let w = project_box_simplex(&v, WeightBounds::new(0.0, bounds.upper));
        let cleaned = clean_weights(&w, WeightBounds::new(0.0, bounds.upper), cutoff);
        let sum: f64 = cleaned.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9, "sum {}", sum);
        for x in &cleaned {
            prop_assert!(*x >= 0.0 && *x <= bounds.upper + 1e-9);
        }
    }

    /// The max-Sharpe solution is at least as good as every vertex of the
    /// simplex and every sampled feasible point.
    #[test]
    fn max_sharpe_beats_vertices_and_feasible_points(
        (mu, cov, raw) in solver_case_strategy(),
    ) {
        let rf = 0.02;
        let n = mu.len();
        let bounds = WeightBounds::new(0.0, 1.0);

        let best_asset = mu.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let solved = ProjectedGradient::default().solve_max_sharpe(&mu, &cov, bounds, rf);
        if best_asset <= rf {
            prop_assert!(matches!(solved, Err(Error::NoExcessReturn { .. })), "expected Err(Error::NoExcessReturn)");
            return Ok(());
        }
        let w = solved.unwrap();
        let got = sharpe_ratio(&w, &mu, &cov, rf);
        prop_assert!(got > 0.0, "sharpe {} for {:?}", got, w);

        let slack = 1e-6 * got.abs().max(1.0);
        for i in 0..n {
            let mut e = vec![0.0; n];
            e[i] = 1.0;
            let vertex = sharpe_ratio(&e, &mu, &cov, rf);
            prop_assert!(got >= vertex - slack, "vertex {} beats {} with {}", i, got, vertex);
        }
        for v in &raw {
            let p = project_box_simplex(v, bounds);
            let other = sharpe_ratio(&p, &mu, &cov, rf);
            prop_assert!(got >= other - slack, "{:?} beats {} with {}", p, got, other);
        }
    }

    // ========================================================================
    // ALLOCATION INVARIANTS
    // ========================================================================

    /// Never overspends, and nothing affordable is left on the table.
    #[test]
    fn allocation_respects_budget(
        entries in prop::collection::vec((0.0..1.0f64, 1.0..500.0f64), 1..8),
        budget in 1u64..100_000,
    ) {
        let total: f64 = entries.iter().map(|(w, _)| w).sum();
        prop_assume!(total > 0.0);

        let weights = WeightVector::new(
            entries
                .iter()
                .enumerate()
                .map(|(i, (w, _))| (format!("T{i}"), w / total))
                .collect(),
        );
        let prices: FxHashMap<String, f64> = entries
            .iter()
            .enumerate()
            .map(|(i, (_, p))| (format!("T{i}"), *p))
            .collect();

        let result = allocate(&weights, &prices, budget).unwrap();
        let spent = result.spent(&prices);
        prop_assert!(spent <= budget as f64 + 1e-6);
        prop_assert!((spent + result.leftover - budget as f64).abs() < 1e-6);
        for (t, w) in weights.nonzero() {
            prop_assert!(result.leftover < prices[t], "could still buy {} at {}", t, prices[t]);
            prop_assert!(w > 0.0);
        }
    }

    // ========================================================================
    // DISSIMILARITY AND CLUSTER INVARIANTS
    // ========================================================================

    /// Zero diagonal, symmetric, within [0, 2].
    #[test]
    fn dissimilarity_is_a_valid_distance(
        prices in price_matrix_strategy(),
        returns_basis in any::<bool>(),
    ) {
        let basis = if returns_basis { CorrelationBasis::Returns } else { CorrelationBasis::Prices };
        let d = DissimilarityEngine::new(basis).compute(&prices).unwrap();
        for i in 0..d.len() {
            prop_assert_eq!(d.distance(i, i), 0.0);
            for j in 0..d.len() {
                prop_assert_eq!(d.distance(i, j), d.distance(j, i));
                prop_assert!((0.0..=2.0).contains(&d.distance(i, j)));
            }
        }
    }

    /// Every instrument gets exactly one label in 0..k and no cluster is empty.
    #[test]
    fn clusters_partition_the_universe(
        (prices, k) in price_matrix_strategy().prop_flat_map(|m| {
            let n = m.n_instruments();
            (Just(m), 1..=n)
        })
    ) {
        let d = DissimilarityEngine::new(CorrelationBasis::Returns).compute(&prices).unwrap();
        let clusters = ClusterEngine::new(k).fit(&d).unwrap();

        prop_assert_eq!(clusters.len(), k);
        prop_assert_eq!(clusters.labels().len(), prices.n_instruments());
        let mut seen = vec![0usize; prices.n_instruments()];
        let mut firsts = Vec::new();
        for (label, members) in clusters.iter() {
            prop_assert!(!members.is_empty());
            firsts.push(members[0]);
            for &i in members {
                prop_assert_eq!(clusters.label_of(i), label);
                seen[i] += 1;
            }
        }
        prop_assert!(seen.iter().all(|&c| c == 1));
        // Labels follow each cluster's lowest member.
        prop_assert!(firsts.windows(2).all(|w| w[0] < w[1]));
    }

    /// Merge heights never decrease.
    #[test]
    fn ward_merges_are_monotone(prices in price_matrix_strategy()) {
        let d = DissimilarityEngine::new(CorrelationBasis::Returns).compute(&prices).unwrap();
        let merges = ClusterEngine::new(1).linkage(&d);
        prop_assert_eq!(merges.len(), prices.n_instruments() - 1);
        for pair in merges.windows(2) {
            prop_assert!(pair[1].distance >= pair[0].distance - 1e-12);
        }
        prop_assert_eq!(merges.last().map(|m| m.size), Some(prices.n_instruments()));
    }
}
