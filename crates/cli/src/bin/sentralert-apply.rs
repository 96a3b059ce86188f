//! Apply saved alert files to Sentry

use anyhow::Result;
use clap::Parser;
use sentralert_cli::commands::apply::run_apply;
use sentralert_cli::commands::analyze::write_metrics;
use sentralert_cli::logging;
use sentralert_cli::output::OutputFormat;
use sentralert_lib::config::AppConfig;
use sentralert_lib::observability::RunMetrics;
use std::path::PathBuf;

/// Create or update Sentry metric alerts from a directory of YAML files
#[derive(Parser)]
#[command(name = "sentralert-apply")]
#[command(author, version, about = "Apply alert YAML files to Sentry", long_about = None)]
struct Args {
    /// Directory containing alert YAML files
    alerts_dir: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: OutputFormat,

    /// Write apply metrics in Prometheus text format to this file
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = AppConfig::load()?;
    let metrics = RunMetrics::new();
    let result = run_apply(&config, &args.alerts_dir, args.format, &metrics).await;

    if let Some(path) = &args.metrics_out {
        write_metrics(&metrics, path)?;
    }
    result?;
    Ok(())
}
