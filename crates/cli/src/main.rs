//! Sentralert CLI
//!
//! Proposes Sentry metric alerts from historical telemetry or from a
//! cross-analysis of the codebase and production traces, then saves them
//! as YAML for review.

use anyhow::Result;
use clap::Parser;
use sentralert_cli::commands::analyze::{run_analysis, AnalyzeOptions, Mode};
use sentralert_cli::logging;
use sentralert_cli::output::OutputFormat;
use sentralert_lib::config::AppConfig;
use sentralert_lib::engine::DEFAULT_ENVIRONMENT;
use sentralert_lib::service_analysis::AnalysisScope;
use std::path::PathBuf;

/// Intelligent alert generation for Sentry
#[derive(Parser)]
#[command(name = "sentralert")]
#[command(author, version, about = "Intelligent alert generation for Sentry", long_about = None)]
#[command(after_help = "Examples:\n  \
    sentralert historical          # Analyze historical Sentry data\n  \
    sentralert service             # Analyze the service codebase for unmonitored endpoints\n  \
    sentralert service --auto      # Analyze and auto-commit to a git branch")]
pub struct Cli {
    /// Analysis mode
    #[arg(value_enum)]
    pub mode: Mode,

    /// Automatically create a git branch, commit, and push the alert files
    #[arg(long)]
    pub auto: bool,

    /// Environment to analyze
    #[arg(long, short, default_value = DEFAULT_ENVIRONMENT)]
    pub environment: String,

    /// Directory receiving the alert YAML files
    #[arg(long, default_value = "alerts")]
    pub output_dir: PathBuf,

    /// Focus the service analysis on one endpoint (e.g. "POST /api/checkout")
    #[arg(long, conflicts_with = "quick")]
    pub endpoint: Option<String>,

    /// Run the short service analysis
    #[arg(long)]
    pub quick: bool,

    /// Write run metrics in Prometheus text format to this file
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    fn scope(&self) -> AnalysisScope {
        match (&self.endpoint, self.quick) {
            (Some(endpoint), _) => AnalysisScope::Endpoint(endpoint.clone()),
            (None, true) => AnalysisScope::Quick,
            (None, false) => AnalysisScope::Comprehensive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = AppConfig::load()?;
    let options = AnalyzeOptions {
        mode: cli.mode,
        environment: cli.environment.clone(),
        output_dir: cli.output_dir.clone(),
        auto: cli.auto,
        scope: cli.scope(),
        metrics_out: cli.metrics_out.clone(),
        format: cli.format,
    };

    run_analysis(&config, &options).await?;
    Ok(())
}
