//! YAML persistence for alert suggestions
//!
//! One document per suggestion, named after the suggestion so that reruns
//! overwrite the previous proposal for the same alert.

use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::models::{AlertSuggestion, METRIC_ALERT_KIND};

const YAML_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// File stem for a suggestion name
///
/// Lowercased, with spaces and `/` replaced by `-`.
pub fn slug(name: &str) -> String {
    name.to_lowercase().replace([' ', '/'], "-")
}

/// Contents of one persisted alert file
#[derive(Debug, Clone, PartialEq)]
pub enum StoredAlert {
    MetricAlert(AlertSuggestion),
    /// Document whose `kind` is not a metric alert (or missing)
    OtherKind(Option<String>),
}

/// Directory of alert YAML files
#[derive(Debug, Clone)]
pub struct SuggestionStore {
    dir: PathBuf,
}

impl SuggestionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn path_for(&self, suggestion: &AlertSuggestion) -> PathBuf {
        self.dir.join(format!("{}.yaml", slug(&suggestion.name)))
    }

    /// Write one suggestion, stamping `proposed_by` with its flow
    pub fn save(&self, suggestion: &AlertSuggestion) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let mut stamped = suggestion.clone();
        stamped.proposed_by = Some(suggestion.flow);

        let path = self.path_for(suggestion);
        fs::write(&path, serde_yaml::to_string(&stamped)?)?;
        debug!(path = %path.display(), name = %suggestion.name, "Saved alert suggestion");
        Ok(path)
    }

    pub fn save_all(&self, suggestions: &[AlertSuggestion]) -> Result<Vec<PathBuf>> {
        suggestions.iter().map(|s| self.save(s)).collect()
    }

    /// Every `*.yaml` / `*.yml` file in the directory, sorted by path
    ///
    /// A missing directory has no files.
    pub fn alert_files(&self) -> Result<Vec<PathBuf>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| YAML_EXTENSIONS.contains(&ext));
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Read one alert file
    pub fn load(path: &Path) -> Result<StoredAlert> {
        let text = fs::read_to_string(path)?;
        let document: Value = serde_yaml::from_str(&text)?;

        let kind = document.get("kind").and_then(Value::as_str).map(str::to_string);
        if kind.as_deref() != Some(METRIC_ALERT_KIND) {
            return Ok(StoredAlert::OtherKind(kind));
        }
        Ok(StoredAlert::MetricAlert(serde_yaml::from_value(document)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlertError;
    use crate::models::{Action, Flow, Thresholds};
    use tempfile::TempDir;

    fn suggestion(name: &str, flow: Flow) -> AlertSuggestion {
        AlertSuggestion::new(flow, name, "transactions", "p95(transaction.duration)", "")
            .with_environment("production")
            .with_thresholds(Thresholds::new(Some(800.0), 1200.0))
            .with_actions(vec![Action::email("team@example.com")])
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("POST /api/checkout high failure rate"), "post--api-checkout-high-failure-rate");
        assert_eq!(slug("High error rate in production"), "high-error-rate-in-production");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = SuggestionStore::new(dir.path().join("alerts"));

        let original = suggestion("Checkout Latency", Flow::ServiceAnalysisAgent);
        let path = store.save(&original).unwrap();
        assert_eq!(path.file_name().unwrap(), "checkout-latency.yaml");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("kind: sentry.metric_alert"));
        assert!(text.contains("proposed_by: service_analysis_agent"));
        assert!(text.contains("timeWindow: 5"));

        match SuggestionStore::load(&path).unwrap() {
            StoredAlert::MetricAlert(loaded) => {
                assert_eq!(loaded.name, original.name);
                assert_eq!(loaded.thresholds, original.thresholds);
                assert_eq!(loaded.proposed_by, Some(Flow::ServiceAnalysisAgent));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_alert_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.yml", "a.yaml", "notes.txt", "c.yaml"] {
            fs::write(dir.path().join(name), "kind: other\n").unwrap();
        }

        let files = SuggestionStore::new(dir.path()).alert_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yml", "c.yaml"]);
    }

    #[test]
    fn test_missing_directory_has_no_files() {
        let dir = TempDir::new().unwrap();
        let store = SuggestionStore::new(dir.path().join("nope"));
        assert!(!store.exists());
        assert!(store.alert_files().unwrap().is_empty());
    }

    #[test]
    fn test_load_other_kind_and_hand_written_files() {
        let dir = TempDir::new().unwrap();
        let issue = dir.path().join("issue.yaml");
        fs::write(&issue, "kind: sentry.issue_alert\nname: x\n").unwrap();
        assert_eq!(
            SuggestionStore::load(&issue).unwrap(),
            StoredAlert::OtherKind(Some("sentry.issue_alert".to_string()))
        );

        let minimal = dir.path().join("minimal.yaml");
        fs::write(
            &minimal,
            "kind: sentry.metric_alert\nname: Minimal\nthresholds:\n  critical: 10\n",
        )
        .unwrap();
        match SuggestionStore::load(&minimal).unwrap() {
            StoredAlert::MetricAlert(s) => {
                assert_eq!(s.dataset, "transactions");
                assert_eq!(s.aggregate, "count()");
                assert_eq!(s.thresholds.critical, Some(10.0));
                assert!(s.actions.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }

        let broken = dir.path().join("broken.yaml");
        fs::write(&broken, "kind: sentry.metric_alert\nthresholds: [\n").unwrap();
        assert!(matches!(SuggestionStore::load(&broken), Err(AlertError::Yaml(_))));
    }
}
