//! Error types for the advisor.

use std::path::PathBuf;

/// All errors that can occur during an advisor run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("price data error: {0}")]
    Data(String),

    #[error("failed to read price file {path}: {source}")]
    DataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse price JSON: {0}")]
    DataParse(#[from] serde_json::Error),

    #[error("failed to render report: {0}")]
    Render(#[source] serde_json::Error),

    #[error(transparent)]
    Pipeline(#[from] clusterfolio::Error),
}

impl Error {
    /// Process exit code: 1 for configuration and data problems, 2 when the
    /// portfolio pipeline itself fails.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Pipeline(clusterfolio::Error::Source(_))
            | Error::Pipeline(clusterfolio::Error::InvalidConfig(_)) => 1,
            Error::Pipeline(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
