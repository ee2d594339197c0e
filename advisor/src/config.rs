//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use clusterfolio::{CorrelationBasis, PipelineConfig, SolverSettings, WeightBounds};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Price file, relative paths resolve against the config file's directory.
    pub prices: PathBuf,
}

/// Overrides for [`PipelineConfig`]. Missing keys keep the library defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default = "default_trading_days")]
    pub trading_days_per_year: usize,
    #[serde(default)]
    pub min_weight: f64,
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
    #[serde(default = "default_cutoff")]
    pub weight_cutoff: f64,
    #[serde(default)]
    pub correlation_basis: CorrelationBasis,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_window() -> usize {
    252
}
fn default_cluster_count() -> usize {
    10
}
fn default_risk_free_rate() -> f64 {
    0.02
}
fn default_trading_days() -> usize {
    252
}
fn default_max_weight() -> f64 {
    0.2
}
fn default_cutoff() -> f64 {
    1e-4
}
fn default_max_iterations() -> usize {
    10_000
}
fn default_tolerance() -> f64 {
    1e-12
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            window: default_window(),
            cluster_count: default_cluster_count(),
            risk_free_rate: default_risk_free_rate(),
            trading_days_per_year: default_trading_days(),
            min_weight: 0.0,
            max_weight: default_max_weight(),
            weight_cutoff: default_cutoff(),
            correlation_basis: CorrelationBasis::default(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

impl PipelineSection {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            window: self.window,
            cluster_count: self.cluster_count,
            risk_free_rate: self.risk_free_rate,
            trading_days_per_year: self.trading_days_per_year,
            weight_bounds: WeightBounds::new(self.min_weight, self.max_weight),
            weight_cutoff: self.weight_cutoff,
            correlation_basis: self.correlation_basis,
            solver: SolverSettings {
                max_iterations: self.max_iterations,
                tolerance: self.tolerance,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `env_logger` filter; `RUST_LOG` still wins.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: Config = toml::from_str(&contents)?;
        if config.data.prices.is_relative() {
            if let Some(dir) = path.parent() {
                config.data.prices = dir.join(&config.data.prices);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.data.prices.as_os_str().is_empty() {
            return Err(Error::Config("data.prices must not be empty".into()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("logging.level must not be empty".into()));
        }
        self.pipeline
            .to_pipeline_config()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        self.pipeline.to_pipeline_config()
    }
}
