//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use sentralert_lib::models::AlertSuggestion;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the suggestions table
#[derive(Tabled, Serialize)]
pub struct SuggestionRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Aggregate")]
    pub aggregate: String,
    #[tabled(rename = "Warning")]
    pub warning: String,
    #[tabled(rename = "Critical")]
    pub critical: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
}

impl From<&AlertSuggestion> for SuggestionRow {
    fn from(s: &AlertSuggestion) -> Self {
        Self {
            name: s.name.clone(),
            aggregate: s.aggregate.clone(),
            warning: format_threshold(s.thresholds.warning),
            critical: format_threshold(s.thresholds.critical),
            severity: color_severity(&s.severity),
        }
    }
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => match render_json(items) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&format!("Failed to render JSON output: {}", e)),
        },
    }
}

/// Pretty JSON for `--format json`
pub fn render_json<T: Serialize>(items: &[T]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(items)
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Threshold cell; blank when unset
pub fn format_threshold(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{:.0}", v),
        Some(v) => format!("{}", v),
        None => "-".to_string(),
    }
}

/// Color severity label
pub fn color_severity(severity: &str) -> String {
    match severity.to_uppercase().as_str() {
        "CRITICAL" => severity.red().bold().to_string(),
        "HIGH" => severity.red().to_string(),
        "MEDIUM" | "WARNING" => severity.yellow().to_string(),
        "LOW" => severity.green().to_string(),
        _ => severity.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_threshold() {
        assert_eq!(format_threshold(Some(50.0)), "50");
        assert_eq!(format_threshold(Some(0.05)), "0.05");
        assert_eq!(format_threshold(None), "-");
    }

    struct Unrenderable;

    impl Serialize for Unrenderable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[test]
    fn test_render_json_reports_failures() {
        let err = render_json(&[Unrenderable]).unwrap_err();
        assert!(err.to_string().contains("not representable"));

        let rows = vec![SuggestionRow {
            name: "High error rate in production".to_string(),
            aggregate: "count()".to_string(),
            warning: "30".to_string(),
            critical: "50".to_string(),
            severity: "HIGH".to_string(),
        }];
        assert!(render_json(&rows).unwrap().contains("\"critical\": \"50\""));
    }
}
