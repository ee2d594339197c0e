//! End-to-end advisor runs against files in a temporary directory.

use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use clusterfolio::InvestmentHorizon;
use clusterfolio_advisor::config::Config;
use clusterfolio_advisor::error::Error;
use clusterfolio_advisor::render::{render_json, render_text};
use clusterfolio_advisor::run::run;
use serde_json::json;
use tempfile::TempDir;

const ROWS: usize = 300;
const INSTRUMENTS: usize = 6;

fn price(i: usize, t: usize) -> f64 {
    let (i, t) = (i as f64, t as f64);
    let group = (i as usize % 2) as f64;
    (50.0 + 10.0 * i)
        * (1.0
            + 0.0015 * t
            + 0.03 * (t * 0.13 + group * 1.7).sin()
            + 0.005 * (t * (0.7 + 0.11 * i)).sin())
}

fn write_prices(dir: &Path) -> PathBuf {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let dates: Vec<String> = (0..ROWS)
        .map(|d| (start + Days::new(d as u64)).format("%Y-%m-%d").to_string())
        .collect();
    let instruments: Vec<_> = (0..INSTRUMENTS)
        .map(|i| {
            let closes: Vec<f64> = (0..ROWS).map(|t| price(i, t)).collect();
            json!({ "ticker": format!("sym.{i}"), "closes": closes })
        })
        .collect();
    let index: Vec<f64> = (0..ROWS)
        .map(|t| (0..INSTRUMENTS).map(|i| price(i, t)).sum::<f64>() / INSTRUMENTS as f64)
        .collect();
    let file = json!({
        "dates": dates,
        "benchmark": { "ticker": "IDX", "closes": index },
        "instruments": instruments,
    });
    let path = dir.join("prices.json");
    std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();
    path
}

fn write_config(dir: &Path, cluster_count: usize) -> PathBuf {
    let path = dir.join("config.toml");
    let toml = format!(
        r#"
[data]
prices = "prices.json"

[pipeline]
window = 252
cluster_count = {cluster_count}
max_weight = 1.0

[logging]
level = "warn"
"#
    );
    std::fs::write(&path, toml).unwrap();
    path
}

fn setup(cluster_count: usize) -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    write_prices(dir.path());
    let config = Config::load(&write_config(dir.path(), cluster_count)).unwrap();
    (dir, config)
}

#[test]
fn builds_a_report_from_files() {
    let (_dir, config) = setup(2);
    let report = run(&config, 10_000, InvestmentHorizon::Short).unwrap();

    assert_eq!(report.portfolio.len(), 2);
    for t in report.portfolio.tickers() {
        assert!(t.starts_with("SYM-"), "ticker not normalized: {t}");
    }
    assert!((report.weights.sum() - 1.0).abs() < 1e-9);
    assert!(report.allocation.leftover <= 10_000.0);
    assert!(!report.allocation.budget_too_small);

    let text = render_text(&report.summary(), 10_000, InvestmentHorizon::Short);
    assert!(text.contains("Expected return"));

    let json: serde_json::Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();
    assert!(json["beta"].is_number());
    assert!(json["weights"].is_object());
}

#[test]
fn same_inputs_same_report() {
    let (_dir, config) = setup(3);
    let a = run(&config, 25_000, InvestmentHorizon::Medium).unwrap();
    let b = run(&config, 25_000, InvestmentHorizon::Medium).unwrap();
    assert_eq!(a, b);
}

#[test]
fn too_many_clusters_is_a_pipeline_failure() {
    let (_dir, config) = setup(INSTRUMENTS + 1);
    let err = run(&config, 10_000, InvestmentHorizon::Short).unwrap_err();
    assert!(matches!(
        err,
        Error::Pipeline(clusterfolio::Error::InvalidClusterCount { .. })
    ));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_price_file_is_a_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&write_config(dir.path(), 2)).unwrap();
    let err = run(&config, 10_000, InvestmentHorizon::Short).unwrap_err();
    assert!(matches!(err, Error::DataRead { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigRead { .. }));
}
