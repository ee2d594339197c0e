//! clusterfolio-advisor: command-line front end for clusterfolio.
//!
//! Reads a TOML config and a JSON price file, builds a clustered max-Sharpe
//! portfolio for a cash budget and investment horizon, and renders the
//! report as text or JSON.

pub mod config;
pub mod error;
pub mod render;
pub mod run;
pub mod source;
