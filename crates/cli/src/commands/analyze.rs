//! `sentralert historical|service`

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use sentralert_lib::config::{AppConfig, ANALYSIS_REQUIRED};
use sentralert_lib::engine::{AnalysisContext, HistoricalAnalysis, SuggestionSource};
use sentralert_lib::models::AlertSuggestion;
use sentralert_lib::observability::RunMetrics;
use sentralert_lib::oracle::{AnthropicClient, JudgmentOracle};
use sentralert_lib::persistence::SuggestionStore;
use sentralert_lib::sentry::SentryClient;
use sentralert_lib::service_analysis::{AnalysisScope, DeepWikiClient, ServiceAnalysisAgent};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::git::GitWorkflow;
use crate::output::{print_error, print_info, print_success, print_table, print_warning, OutputFormat, SuggestionRow};

/// Which flow proposes alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Analyze past Sentry metrics
    Historical,
    /// Cross-analyze the codebase and production traces
    Service,
}

/// Options for one analysis run
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub mode: Mode,
    pub environment: String,
    pub output_dir: PathBuf,
    pub auto: bool,
    pub scope: AnalysisScope,
    pub metrics_out: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Run one flow, save its suggestions and optionally push them
///
/// Missing configuration fails before any client is built.
pub async fn run_analysis(config: &AppConfig, opts: &AnalyzeOptions) -> Result<Vec<AlertSuggestion>> {
    config.require(ANALYSIS_REQUIRED)?;

    let sentry = Arc::new(SentryClient::new(&config.sentry_settings()?)?);
    let anthropic = Arc::new(AnthropicClient::new(&config.oracle_settings()?)?);
    let defaults = config.alert_defaults();

    let source: Box<dyn SuggestionSource> = match opts.mode {
        Mode::Historical => {
            print_info("Running Historical Analysis...");
            Box::new(HistoricalAnalysis::new(sentry, anthropic.clone(), defaults))
        }
        Mode::Service => {
            print_info(&format!(
                "Running Service Analysis Agent ({} scope)...",
                opts.scope.as_str()
            ));
            let deepwiki = DeepWikiClient::new(&config.deepwiki_mcp_url, &config.deepwiki_repo_url)?;
            Box::new(
                ServiceAnalysisAgent::new(anthropic.clone(), sentry, deepwiki, defaults)
                    .with_scope(opts.scope.clone()),
            )
        }
    };

    analyze_with(source.as_ref(), anthropic, opts).await
}

/// Run `source` and handle its suggestions
///
/// `oracle` names the branch when `--auto` is set. Metrics are written
/// even when the analysis fails.
pub async fn analyze_with(
    source: &dyn SuggestionSource,
    oracle: Arc<dyn JudgmentOracle>,
    opts: &AnalyzeOptions,
) -> Result<Vec<AlertSuggestion>> {
    let ctx = AnalysisContext::new(opts.environment.clone());

    let result = source.propose(&ctx).await.context("Analysis failed");
    if let Some(path) = &opts.metrics_out {
        write_metrics(&ctx.metrics, path)?;
    }
    let suggestions = result?;

    if suggestions.is_empty() {
        print_warning("No alerts suggested");
        return Ok(suggestions);
    }

    let store = SuggestionStore::new(&opts.output_dir);
    let files = store
        .save_all(&suggestions)
        .with_context(|| format!("Failed to save alerts to {}", opts.output_dir.display()))?;

    let rows: Vec<SuggestionRow> = suggestions.iter().map(SuggestionRow::from).collect();
    print_table(&rows, opts.format);
    print_success(&format!(
        "Saved {} alert file(s) to {}",
        files.len(),
        opts.output_dir.display()
    ));

    if opts.auto {
        let names: Vec<String> = suggestions.iter().map(|s| s.name.clone()).collect();
        match GitWorkflow::new(".").run(oracle.as_ref(), &names, &opts.output_dir).await {
            Ok(branch) => {
                println!();
                println!("{}", "Auto workflow complete!".bold());
                println!("Next steps:");
                println!("  1. Create PR: gh pr create --base main --head {}", branch);
            }
            Err(e) => {
                // Files are saved either way, so the run still succeeds
                print_error(&format!("Git operation failed: {e:#}"));
                println!("You may need to manually commit and push the changes.");
            }
        }
    } else {
        print_next_steps(&opts.output_dir);
    }

    Ok(suggestions)
}

fn print_next_steps(output_dir: &Path) {
    let dir = output_dir.display();
    println!();
    println!("Next steps:");
    println!("  1. Review the alerts in {}", dir.to_string().cyan());
    println!("  2. Run with --auto to automatically create a branch and push");
    println!("     OR");
    println!("  3. Manually commit: git add {} && git commit", dir);
    println!("  4. Create PR: gh pr create");
}

/// Dump run metrics in the Prometheus text format
pub fn write_metrics(metrics: &RunMetrics, path: &Path) -> Result<()> {
    std::fs::write(path, metrics.encode())
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}
