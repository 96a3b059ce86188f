//! p95 latency regression detection
//!
//! Compares each transaction's p95 over the last hour against its 7-day
//! baseline. Regressions that clear both gates are handed to the judgment
//! oracle, which names the alert, picks thresholds and may veto it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{default_actions, CURRENT_WINDOW};
use crate::config::AlertDefaults;
use crate::engine::{AnalysisContext, Detector};
use crate::error::{AlertError, Result};
use crate::models::{AlertSuggestion, Detection, Flow, MetricKind, MetricRow, Thresholds};
use crate::observability::verdict;
use crate::oracle::{extract_json, JudgmentOracle, DEFAULT_TEMPERATURE};
use crate::telemetry::{
    subject_filter, transaction_filter, TelemetrySource, COUNT_FIELD, P95_DURATION_FIELD,
    TRANSACTION_FIELD,
};

/// Baseline lookback window
const BASELINE_WINDOW: &str = "7d";

/// Current p95 must exceed this many milliseconds
const DEFAULT_MATERIALITY_FLOOR_MS: f64 = 500.0;

/// Current p95 must exceed the baseline by this factor
const DEFAULT_REGRESSION_RATIO: f64 = 1.4;

/// Resolve once latency falls back to within 10% of the baseline
const RESOLVE_FACTOR: f64 = 1.1;

const QUERY_FIELDS: &[&str] = &[TRANSACTION_FIELD, P95_DURATION_FIELD, COUNT_FIELD];

/// Oracle answer for one regression, read once `is_legitimate` holds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LatencyVerdict {
    pub alert_name: String,
    pub justification: String,
    pub severity: String,
    pub warning_threshold_ms: f64,
    pub critical_threshold_ms: f64,
}

impl LatencyVerdict {
    /// Read an oracle answer
    ///
    /// Returns `Ok(None)` when the oracle judged the regression not worth
    /// alerting on. The remaining keys are only required for legitimate
    /// regressions.
    pub fn from_response(text: &str) -> Result<Option<Self>> {
        let value = extract_json(text).into_value()?;
        if !is_truthy(value.get("is_legitimate")) {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AlertError::MalformedOracleResponse(e.to_string()))
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Detects p95 latency regressions
pub struct LatencyRegressionDetector {
    telemetry: Arc<dyn TelemetrySource>,
    oracle: Arc<dyn JudgmentOracle>,
    defaults: AlertDefaults,
    /// Minimum current p95, in milliseconds
    pub materiality_floor_ms: f64,
    /// Minimum current / baseline ratio
    pub regression_ratio: f64,
}

impl LatencyRegressionDetector {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        oracle: Arc<dyn JudgmentOracle>,
        defaults: AlertDefaults,
    ) -> Self {
        Self {
            telemetry,
            oracle,
            defaults,
            materiality_floor_ms: DEFAULT_MATERIALITY_FLOOR_MS,
            regression_ratio: DEFAULT_REGRESSION_RATIO,
        }
    }

    pub fn with_materiality_floor(mut self, floor_ms: f64) -> Self {
        self.materiality_floor_ms = floor_ms;
        self
    }

    pub fn with_regression_ratio(mut self, ratio: f64) -> Self {
        self.regression_ratio = ratio;
        self
    }

    /// Whether a current p95 counts as a regression over `baseline`
    ///
    /// A missing or zero baseline never does.
    pub fn is_regression(&self, baseline: Option<f64>, current: f64) -> bool {
        match baseline {
            Some(base) if base != 0.0 => {
                current > self.materiality_floor_ms && current > self.regression_ratio * base
            }
            _ => false,
        }
    }

    /// Pair current rows with their baselines, in current-row order
    pub fn find_regressions(
        &self,
        baseline: &[MetricRow],
        current: &[MetricRow],
        environment: &str,
    ) -> Vec<Detection> {
        let baseline_by_subject: HashMap<&str, f64> = baseline
            .iter()
            .filter_map(|row| {
                Some((
                    row.str_field(TRANSACTION_FIELD)?,
                    row.f64_field(P95_DURATION_FIELD)?,
                ))
            })
            .collect();

        current
            .iter()
            .filter_map(|row| {
                let subject = row.str_field(TRANSACTION_FIELD)?;
                let current_value = row.f64_field(P95_DURATION_FIELD)?;
                let baseline_value = baseline_by_subject.get(subject).copied();

                self.is_regression(baseline_value, current_value)
                    .then(|| Detection {
                        subject: subject.to_string(),
                        metric_kind: MetricKind::LatencyP95,
                        baseline_value,
                        current_value,
                        environment: environment.to_string(),
                    })
            })
            .collect()
    }

    /// Build the review prompt for one regression
    pub fn review_prompt(detection: &Detection) -> String {
        let baseline = detection.baseline_value.unwrap_or_default();
        let regression = detection.regression_percent().unwrap_or_default();
        format!(
            r#"Analyze this latency regression:

TRANSACTION: {subject}
- Baseline p95 (7d): {baseline:.0}ms
- Current p95 (1h): {current:.0}ms
- Regression: {regression:.1}%

Respond with valid JSON only:
{{
  "alert_name": "brief descriptive name",
  "justification": "2-3 sentences explaining why this alert is needed",
  "severity": "LOW/MEDIUM/HIGH/CRITICAL",
  "warning_threshold_ms": <number>,
  "critical_threshold_ms": <number>,
  "is_legitimate": true/false
}}

Only mark is_legitimate=true if regression > 30% and current latency > 500ms.
"#,
            subject = detection.subject,
            current = detection.current_value,
        )
    }

    /// Turn an accepted verdict into a suggestion
    pub fn build_suggestion(&self, detection: &Detection, verdict: LatencyVerdict) -> AlertSuggestion {
        let mut suggestion = AlertSuggestion::new(
            Flow::Historical,
            verdict.alert_name,
            "transactions",
            P95_DURATION_FIELD,
            subject_filter(&detection.subject, &detection.environment),
        )
        .with_environment(detection.environment.clone())
        .with_thresholds(Thresholds::new(
            Some(verdict.warning_threshold_ms),
            verdict.critical_threshold_ms,
        ))
        .with_justification(verdict.justification)
        .with_severity(verdict.severity)
        .with_actions(default_actions(&self.defaults));

        if let Some(baseline) = detection.baseline_value {
            suggestion = suggestion.with_resolve_threshold((baseline * RESOLVE_FACTOR).round());
        }
        suggestion
    }

    /// Ask the oracle about one detection; failures drop the subject
    async fn review(&self, detection: &Detection, ctx: &AnalysisContext) -> Option<AlertSuggestion> {
        let prompt = Self::review_prompt(detection);
        let outcome = match self.oracle.analyze(&prompt, DEFAULT_TEMPERATURE).await {
            Ok(text) => LatencyVerdict::from_response(&text),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Some(answer)) => {
                ctx.metrics.inc_oracle_verdict(verdict::ACCEPTED);
                let suggestion = self.build_suggestion(detection, answer);
                ctx.logger.log_suggestion(Flow::Historical, &suggestion.name);
                Some(suggestion)
            }
            Ok(None) => {
                ctx.metrics.inc_oracle_verdict(verdict::REJECTED);
                ctx.logger
                    .log_suggestion_skipped(&detection.subject, "not significant enough");
                None
            }
            Err(e) => {
                let outcome = if e.is_transport() {
                    verdict::UNAVAILABLE
                } else {
                    verdict::MALFORMED
                };
                ctx.metrics.inc_oracle_verdict(outcome);
                ctx.logger.log_oracle_failure(&detection.subject, &e.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl Detector for LatencyRegressionDetector {
    fn name(&self) -> &'static str {
        "latency_regression"
    }

    async fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<AlertSuggestion>> {
        let filter = transaction_filter(&ctx.environment);
        let baseline = self
            .telemetry
            .query(QUERY_FIELDS, &filter, BASELINE_WINDOW)
            .await?;
        let current = self
            .telemetry
            .query(QUERY_FIELDS, &filter, CURRENT_WINDOW)
            .await?;

        let mut suggestions = Vec::new();
        for detection in self.find_regressions(&baseline, &current, &ctx.environment) {
            ctx.metrics.inc_detection(detection.metric_kind.as_str());
            ctx.logger.log_detection(&detection);

            if let Some(suggestion) = self.review(&detection, ctx).await {
                suggestions.push(suggestion);
            }
        }
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTelemetry, ScriptedOracle};

    fn row(subject: &str, p95: f64) -> MetricRow {
        MetricRow::new()
            .with(TRANSACTION_FIELD, subject)
            .with(P95_DURATION_FIELD, p95)
            .with(COUNT_FIELD, 800)
    }

    fn detector(telemetry: FakeTelemetry, oracle: Arc<ScriptedOracle>) -> LatencyRegressionDetector {
        LatencyRegressionDetector::new(Arc::new(telemetry), oracle, AlertDefaults::default())
    }

    fn verdict_json(legitimate: bool) -> String {
        format!(
            "Here is my assessment:\n```json\n{{\"alert_name\": \"Checkout latency regression\", \
             \"justification\": \"p95 doubled.\", \"severity\": \"HIGH\", \
             \"warning_threshold_ms\": 450, \"critical_threshold_ms\": 550, \
             \"is_legitimate\": {legitimate}}}\n```"
        )
    }

    #[test]
    fn test_regression_gates() {
        let d = detector(FakeTelemetry::new(), Arc::new(ScriptedOracle::new()));

        // Below the materiality floor
        assert!(!d.is_regression(Some(300.0), 450.0));
        assert!(!d.is_regression(Some(300.0), 500.0));
        // Above the floor but within 1.4x
        assert!(!d.is_regression(Some(400.0), 550.0));
        // Missing or zero baseline
        assert!(!d.is_regression(None, 900.0));
        assert!(!d.is_regression(Some(0.0), 900.0));

        assert!(d.is_regression(Some(300.0), 600.0));
        assert!(d.is_regression(Some(400.0), 561.0));
    }

    #[test]
    fn test_find_regressions_keeps_current_row_order() {
        let d = detector(FakeTelemetry::new(), Arc::new(ScriptedOracle::new()));
        let baseline = vec![row("/b", 300.0), row("/a", 300.0), row("/c", 300.0)];
        let current = vec![row("/a", 700.0), row("/c", 450.0), row("/b", 800.0), row("/new", 2000.0)];

        let found = d.find_regressions(&baseline, &current, "production");
        let subjects: Vec<_> = found.iter().map(|d| d.subject.as_str()).collect();
        assert_eq!(subjects, vec!["/a", "/b"]);
        assert_eq!(found[0].baseline_value, Some(300.0));
        assert_eq!(found[0].environment, "production");
    }

    #[test]
    fn test_review_prompt_formats_numbers() {
        let detection = Detection {
            subject: "/api/checkout".to_string(),
            metric_kind: MetricKind::LatencyP95,
            baseline_value: Some(300.4),
            current_value: 612.7,
            environment: "production".to_string(),
        };
        let prompt = LatencyRegressionDetector::review_prompt(&detection);
        assert!(prompt.contains("TRANSACTION: /api/checkout"));
        assert!(prompt.contains("Baseline p95 (7d): 300ms"));
        assert!(prompt.contains("Current p95 (1h): 613ms"));
        assert!(prompt.contains("Regression: 104.0%"));
        assert!(prompt.contains("\"is_legitimate\": true/false"));
        assert!(prompt.contains("regression > 30% and current latency > 500ms"));
    }

    #[test]
    fn test_verdict_requires_keys_only_when_legitimate() {
        assert_eq!(
            LatencyVerdict::from_response("{\"is_legitimate\": false}").unwrap(),
            None
        );
        assert!(LatencyVerdict::from_response("{\"is_legitimate\": true}").is_err());
        assert!(LatencyVerdict::from_response("I cannot decide").is_err());

        let verdict = LatencyVerdict::from_response(&verdict_json(true))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.alert_name, "Checkout latency regression");
        assert_eq!(verdict.critical_threshold_ms, 550.0);
    }

    #[tokio::test]
    async fn test_no_detection_below_floor() {
        let telemetry = FakeTelemetry::new()
            .with_latency("7d", vec![row("/api/checkout", 300.0)])
            .with_latency("1h", vec![row("/api/checkout", 450.0)]);
        let oracle = Arc::new(ScriptedOracle::new());
        let ctx = AnalysisContext::new("production");

        let found = detector(telemetry, oracle.clone()).detect(&ctx).await.unwrap();
        assert!(found.is_empty());
        assert!(oracle.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_accepted_regression_becomes_suggestion() {
        let telemetry = FakeTelemetry::new()
            .with_latency("7d", vec![row("/api/checkout", 300.0)])
            .with_latency("1h", vec![row("/api/checkout", 600.0)]);
        let oracle = Arc::new(ScriptedOracle::new().reply(&verdict_json(true)));
        let ctx = AnalysisContext::new("production");

        let found = detector(telemetry, oracle.clone()).detect(&ctx).await.unwrap();

        assert_eq!(found.len(), 1);
        let suggestion = &found[0];
        assert_eq!(suggestion.name, "Checkout latency regression");
        assert_eq!(suggestion.aggregate, "p95(transaction.duration)");
        assert_eq!(suggestion.dataset, "transactions");
        assert_eq!(
            suggestion.query,
            "event.type:transaction transaction:\"/api/checkout\" environment:production"
        );
        assert_eq!(suggestion.resolve_threshold, Some(330.0));
        assert_eq!(suggestion.thresholds, Thresholds::new(Some(450.0), 550.0));
        assert_eq!(suggestion.severity, "HIGH");
        assert_eq!(suggestion.environment.as_deref(), Some("production"));
        assert_eq!(suggestion.actions[0].target_identifier, "team@example.com");
        assert_eq!(oracle.prompts().len(), 1);
        assert_eq!(ctx.metrics.oracle_verdict_count(verdict::ACCEPTED), 1);
    }

    #[tokio::test]
    async fn test_oracle_veto_and_failures_drop_only_that_subject() {
        let telemetry = FakeTelemetry::new()
            .with_latency(
                "7d",
                vec![row("/a", 300.0), row("/b", 300.0), row("/c", 300.0), row("/d", 300.0)],
            )
            .with_latency(
                "1h",
                vec![row("/a", 700.0), row("/b", 700.0), row("/c", 700.0), row("/d", 700.0)],
            );
        let oracle = Arc::new(
            ScriptedOracle::new()
                .fail()
                .reply("not json at all")
                .reply(&verdict_json(false))
                .reply(&verdict_json(true)),
        );
        let ctx = AnalysisContext::new("production");

        let found = detector(telemetry, oracle.clone()).detect(&ctx).await.unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].query.contains("transaction:\"/d\""));
        assert_eq!(oracle.prompts().len(), 4);
        assert_eq!(ctx.metrics.oracle_verdict_count(verdict::UNAVAILABLE), 1);
        assert_eq!(ctx.metrics.oracle_verdict_count(verdict::MALFORMED), 1);
        assert_eq!(ctx.metrics.oracle_verdict_count(verdict::REJECTED), 1);
    }

    #[tokio::test]
    async fn test_queries_baseline_then_current() {
        let telemetry = Arc::new(FakeTelemetry::new());
        let d = LatencyRegressionDetector::new(
            telemetry.clone(),
            Arc::new(ScriptedOracle::new()),
            AlertDefaults::default(),
        );
        d.detect(&AnalysisContext::new("staging")).await.unwrap();

        let calls = telemetry.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].time_window, "7d");
        assert_eq!(calls[1].time_window, "1h");
        assert_eq!(calls[0].filter, "event.type:transaction environment:staging");
        assert_eq!(
            calls[0].fields,
            vec!["transaction", "p95(transaction.duration)", "count()"]
        );
    }
}
