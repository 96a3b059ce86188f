//! `sentralert-apply <dir>`

use anyhow::{Context, Result};
use sentralert_lib::config::{AppConfig, BACKEND_REQUIRED};
use sentralert_lib::observability::RunMetrics;
use sentralert_lib::persistence::SuggestionStore;
use sentralert_lib::reconciler::{BatchReport, Reconciler, RuleBackend};
use sentralert_lib::sentry::SentryClient;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{print_error, print_info, print_success, print_table, print_warning, OutputFormat};

/// Row for the applied-rules table
#[derive(Tabled, Serialize)]
struct AppliedRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Rule ID")]
    rule_id: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

/// Apply every alert file under `dir` to the configured organization
pub async fn run_apply(
    config: &AppConfig,
    dir: &Path,
    format: OutputFormat,
    metrics: &RunMetrics,
) -> Result<BatchReport> {
    config.require(BACKEND_REQUIRED)?;
    let client = Arc::new(SentryClient::new(&config.sentry_settings()?)?);

    println!(
        "Applying alerts from {} to Sentry organization: {}",
        dir.display(),
        client.org_slug()
    );
    println!("{}", "=".repeat(80));

    apply_with(client, dir, format, metrics).await
}

/// Apply `dir` through an explicit backend
pub async fn apply_with(
    backend: Arc<dyn RuleBackend>,
    dir: &Path,
    format: OutputFormat,
    metrics: &RunMetrics,
) -> Result<BatchReport> {
    let store = SuggestionStore::new(dir);
    if !store.exists() {
        print_warning(&format!("Alerts directory not found: {}", dir.display()));
        return Ok(BatchReport::default());
    }

    let report = Reconciler::new(backend)
        .with_metrics(metrics.clone())
        .apply_directory(&store)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;

    if report.files == 0 {
        print_warning(&format!("No YAML files found in {}", dir.display()));
        return Ok(report);
    }

    for item in &report.skipped {
        print_info(&format!("Skipping {} - not a metric alert", item));
    }
    for failure in &report.failures {
        print_error(&format!("Error processing {}: {}", failure.item, failure.error));
    }

    let rows: Vec<AppliedRow> = report
        .applied
        .iter()
        .map(|rule| AppliedRow {
            name: rule.name.clone(),
            project: rule.project.clone(),
            rule_id: rule.rule_id.clone(),
            outcome: rule.outcome.as_str().to_string(),
        })
        .collect();
    if !rows.is_empty() {
        print_table(&rows, format);
    }

    println!("{}", "=".repeat(80));
    print_success(&format!("Successfully processed {} alert(s)", report.succeeded()));
    Ok(report)
}
