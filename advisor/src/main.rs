//! CLI entry point for the clusterfolio advisor.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use clusterfolio::InvestmentHorizon;
use clusterfolio_advisor::config::Config;
use clusterfolio_advisor::error::Error;
use clusterfolio_advisor::{render, run};

#[derive(Parser)]
#[command(name = "advisor")]
#[command(about = "Clustered max-Sharpe portfolio for a cash budget")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Cash to invest, in whole currency units
    #[arg(long)]
    budget: u64,

    /// short (<1y), medium (1-3y) or long (>3y)
    #[arg(long, default_value = "medium", value_parser = parse_horizon)]
    horizon: InvestmentHorizon,

    /// Print the full report as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn parse_horizon(s: &str) -> Result<InvestmentHorizon, String> {
    s.parse().map_err(|e: clusterfolio::Error| e.to_string())
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .format_timestamp_secs()
    .init();

    let output = run::run(&config, cli.budget, cli.horizon).and_then(|report| {
        if cli.json {
            render::render_json(&report)
        } else {
            Ok(render::render_text(&report.summary(), cli.budget, cli.horizon))
        }
    });

    match output {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => {
            match &e {
                Error::Pipeline(_) => eprintln!("Pipeline failed: {e}"),
                _ => eprintln!("Error: {e}"),
            }
            process::exit(e.exit_code());
        }
    }
}
