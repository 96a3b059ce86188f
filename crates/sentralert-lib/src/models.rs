//! Core data models for alert proposals

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag carried by every metric-alert suggestion
pub const METRIC_ALERT_KIND: &str = "sentry.metric_alert";

/// Evaluation window, in minutes, for proposed rules
pub const DEFAULT_TIME_WINDOW: u32 = 5;

/// One aggregate row returned by a telemetry query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricRow(pub HashMap<String, Value>);

impl MetricRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion, mostly for fixtures
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Numeric field; numeric strings are accepted as well
    pub fn f64_field(&self, field: &str) -> Option<f64> {
        match self.0.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Metric a detection was raised on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    LatencyP95,
    ErrorCount,
    FailureRate,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LatencyP95 => "latency_p95",
            Self::ErrorCount => "error_count",
            Self::FailureRate => "failure_rate",
        }
    }
}

/// Raw detector output, before oracle review
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub subject: String,
    pub metric_kind: MetricKind,
    pub baseline_value: Option<f64>,
    pub current_value: f64,
    pub environment: String,
}

impl Detection {
    /// Percentage increase of current over baseline
    pub fn regression_percent(&self) -> Option<f64> {
        let baseline = self.baseline_value?;
        if baseline.abs() < f64::EPSILON {
            return None;
        }
        Some((self.current_value / baseline - 1.0) * 100.0)
    }
}

/// Flow that proposed a suggestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    #[default]
    Historical,
    ServiceAnalysisAgent,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Historical => "historical",
            Flow::ServiceAnalysisAgent => "service_analysis_agent",
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold comparison direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    #[default]
    Above,
    /// Unrecognised directions compare below
    #[serde(other)]
    Below,
}

/// Trigger thresholds of a suggestion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
}

impl Thresholds {
    pub fn new(warning: Option<f64>, critical: f64) -> Self {
        Self {
            warning,
            critical: Some(critical),
        }
    }
}

/// Notification target attached to a suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type", default = "default_action_type")]
    pub action_type: String,
    #[serde(default = "default_target_type")]
    pub target_type: String,
    #[serde(default)]
    pub target_identifier: String,
}

fn default_action_type() -> String {
    "email".to_string()
}

fn default_target_type() -> String {
    "specific".to_string()
}

impl Action {
    /// Email a specific address
    pub fn email(address: impl Into<String>) -> Self {
        Self {
            action_type: default_action_type(),
            target_type: default_target_type(),
            target_identifier: address.into(),
        }
    }
}

/// Normalized alert proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSuggestion {
    pub kind: String,
    #[serde(default)]
    pub flow: Flow,
    pub name: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_aggregate")]
    pub aggregate: String,
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_time_window")]
    pub time_window: u32,
    #[serde(default)]
    pub threshold_type: ThresholdType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_threshold: Option<f64>,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(
        rename = "proposed_by",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub proposed_by: Option<Flow>,
}

fn default_dataset() -> String {
    "transactions".to_string()
}

fn default_aggregate() -> String {
    "count()".to_string()
}

fn default_time_window() -> u32 {
    DEFAULT_TIME_WINDOW
}

impl AlertSuggestion {
    /// Start a metric-alert suggestion; thresholds and metadata are added
    /// with the `with_*` methods
    pub fn new(
        flow: Flow,
        name: impl Into<String>,
        dataset: impl Into<String>,
        aggregate: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            kind: METRIC_ALERT_KIND.to_string(),
            flow,
            name: name.into(),
            dataset: dataset.into(),
            aggregate: aggregate.into(),
            query: query.into(),
            time_window: DEFAULT_TIME_WINDOW,
            threshold_type: ThresholdType::Above,
            environment: None,
            thresholds: Thresholds::default(),
            resolve_threshold: None,
            justification: String::new(),
            severity: String::new(),
            actions: Vec::new(),
            proposed_by: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        let environment = environment.into();
        self.environment = (!environment.is_empty()).then_some(environment);
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_time_window(mut self, minutes: u32) -> Self {
        self.time_window = minutes;
        self
    }

    pub fn with_resolve_threshold(mut self, value: f64) -> Self {
        self.resolve_threshold = Some(value);
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = justification.into();
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = severity.into();
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn is_metric_alert(&self) -> bool {
        self.kind == METRIC_ALERT_KIND
    }
}

/// Rule already configured on the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRule {
    pub id: String,
    pub name: String,
}

/// Action as submitted to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub target_type: String,
    pub target_identifier: String,
}

/// Trigger tier label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerLabel {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub label: TriggerLabel,
    pub alert_threshold: f64,
    pub actions: Vec<PayloadAction>,
}

/// Final alert-rule submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRulePayload {
    pub name: String,
    pub dataset: String,
    pub query: String,
    pub aggregate: String,
    pub time_window: u32,
    /// 0 = above, 1 = below
    pub threshold_type: u8,
    pub triggers: Vec<Trigger>,
    pub projects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_row_accessors() {
        let row = MetricRow::new()
            .with("transaction", "/api/checkout")
            .with("p95(transaction.duration)", 612.5)
            .with("count()", "42");

        assert_eq!(row.str_field("transaction"), Some("/api/checkout"));
        assert_eq!(row.f64_field("p95(transaction.duration)"), Some(612.5));
        assert_eq!(row.f64_field("count()"), Some(42.0));
        assert_eq!(row.f64_field("missing"), None);
    }

    #[test]
    fn test_regression_percent() {
        let detection = Detection {
            subject: "/api/orders".to_string(),
            metric_kind: MetricKind::LatencyP95,
            baseline_value: Some(300.0),
            current_value: 600.0,
            environment: "production".to_string(),
        };
        assert!((detection.regression_percent().unwrap() - 100.0).abs() < 1e-9);

        let no_baseline = Detection {
            baseline_value: None,
            ..detection
        };
        assert!(no_baseline.regression_percent().is_none());
    }

    #[test]
    fn test_suggestion_serializes_camel_case() {
        let suggestion = AlertSuggestion::new(
            Flow::Historical,
            "High error rate in production",
            "events",
            "count()",
            "event.type:error environment:production",
        )
        .with_environment("production")
        .with_thresholds(Thresholds::new(Some(30.0), 50.0))
        .with_actions(vec![Action::email("team@example.com")]);

        let json = serde_json::to_value(&suggestion).unwrap();
        assert_eq!(json["kind"], "sentry.metric_alert");
        assert_eq!(json["flow"], "historical");
        assert_eq!(json["timeWindow"], 5);
        assert_eq!(json["thresholdType"], "above");
        assert_eq!(json["thresholds"]["warning"], 30.0);
        assert_eq!(json["actions"][0]["targetType"], "specific");
        assert!(json.get("resolveThreshold").is_none());
        assert!(json.get("proposed_by").is_none());
    }

    #[test]
    fn test_unknown_threshold_type_reads_as_below() {
        let parsed: ThresholdType = serde_json::from_str("\"sideways\"").unwrap();
        assert_eq!(parsed, ThresholdType::Below);
    }

    #[test]
    fn test_empty_environment_is_dropped() {
        let suggestion =
            AlertSuggestion::new(Flow::Historical, "x", "transactions", "count()", "")
                .with_environment("");
        assert!(suggestion.environment.is_none());
    }
}
