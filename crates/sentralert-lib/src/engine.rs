//! Alert-proposal engine
//!
//! [`SuggestionSource`] is the single capability both analysis flows
//! implement. [`HistoricalAnalysis`] runs the mechanical detectors in a fixed
//! order and concatenates their suggestions.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AlertDefaults;
use crate::detectors::{ErrorRateDetector, FailureRateDetector, LatencyRegressionDetector};
use crate::error::Result;
use crate::models::{AlertSuggestion, Flow};
use crate::observability::{dropped, RunMetrics, StructuredLogger};
use crate::oracle::JudgmentOracle;
use crate::telemetry::TelemetrySource;

/// Environment name used when none is given
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Everything a run shares across detectors
#[derive(Clone)]
pub struct AnalysisContext {
    pub environment: String,
    pub logger: StructuredLogger,
    pub metrics: RunMetrics,
}

impl AnalysisContext {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            logger: StructuredLogger::for_new_run(),
            metrics: RunMetrics::new(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Something that yields alert suggestions for an analysis context
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Flow tag stamped on the suggestions this source yields
    fn flow(&self) -> Flow;

    async fn propose(&self, ctx: &AnalysisContext) -> Result<Vec<AlertSuggestion>>;
}

/// One mechanical detector of the historical flow
#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<AlertSuggestion>>;
}

/// Historical metrics analysis: latency regression, error-rate spike and
/// failure-rate detectors, in that order
pub struct HistoricalAnalysis {
    detectors: Vec<Box<dyn Detector>>,
}

impl HistoricalAnalysis {
    /// Standard detector set over the given collaborators
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        oracle: Arc<dyn JudgmentOracle>,
        defaults: AlertDefaults,
    ) -> Self {
        Self::with_detectors(vec![
            Box::new(LatencyRegressionDetector::new(
                telemetry.clone(),
                oracle,
                defaults.clone(),
            )),
            Box::new(ErrorRateDetector::new(telemetry.clone(), defaults.clone())),
            Box::new(FailureRateDetector::new(telemetry, defaults)),
        ])
    }

    /// Run an explicit detector list, in order
    pub fn with_detectors(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }
}

#[async_trait]
impl SuggestionSource for HistoricalAnalysis {
    fn flow(&self) -> Flow {
        Flow::Historical
    }

    async fn propose(&self, ctx: &AnalysisContext) -> Result<Vec<AlertSuggestion>> {
        let started = Instant::now();
        ctx.logger.log_run_started(Flow::Historical, &ctx.environment);

        let mut suggestions = Vec::new();
        for detector in &self.detectors {
            // Telemetry failures abort the remaining detectors
            let found = detector.detect(ctx).await?;
            tracing::debug!(detector = detector.name(), found = found.len(), "Detector finished");
            suggestions.extend(found);
        }

        let suggestions = enforce_unique_names(suggestions, ctx);
        for suggestion in &suggestions {
            ctx.metrics.inc_suggestion(suggestion.flow);
        }

        let elapsed = started.elapsed().as_secs_f64();
        ctx.metrics.observe_run_duration(elapsed);
        ctx.logger
            .log_run_finished(Flow::Historical, suggestions.len(), elapsed);
        Ok(suggestions)
    }
}

/// Drop suggestions with empty names and later duplicates of a name,
/// keeping list order
pub fn enforce_unique_names(
    suggestions: Vec<AlertSuggestion>,
    ctx: &AnalysisContext,
) -> Vec<AlertSuggestion> {
    let mut seen = HashSet::new();
    suggestions
        .into_iter()
        .filter(|s| match name_rejection(&s.name, &mut seen) {
            Some(reason) => {
                ctx.logger.log_dropped_name(&s.name, reason);
                false
            }
            None => true,
        })
        .collect()
}

/// Reason `name` cannot be kept, recording it in `seen` otherwise
pub fn name_rejection(name: &str, seen: &mut HashSet<String>) -> Option<&'static str> {
    if name.trim().is_empty() {
        Some(dropped::EMPTY_NAME)
    } else if !seen.insert(name.to_string()) {
        Some(dropped::DUPLICATE_NAME)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlertError;
    use crate::models::MetricRow;
    use crate::telemetry::{COUNT_FIELD, FAILURE_RATE_FIELD, P95_DURATION_FIELD, TRANSACTION_FIELD};
    use crate::testing::{FakeTelemetry, ScriptedOracle};

    fn latency_row(subject: &str, p95: f64) -> MetricRow {
        MetricRow::new()
            .with(TRANSACTION_FIELD, subject)
            .with(P95_DURATION_FIELD, p95)
            .with(COUNT_FIELD, 1200)
    }

    fn engine(telemetry: FakeTelemetry, oracle: ScriptedOracle) -> HistoricalAnalysis {
        HistoricalAnalysis::new(Arc::new(telemetry), Arc::new(oracle), AlertDefaults::default())
    }

    const LEGITIMATE: &str = r#"```json
{
  "alert_name": "Checkout p95 latency regression",
  "justification": "p95 doubled against the weekly baseline.",
  "severity": "HIGH",
  "warning_threshold_ms": 450,
  "critical_threshold_ms": 550,
  "is_legitimate": true
}
```"#;

    #[tokio::test]
    async fn test_detector_order_is_fixed() {
        let engine = engine(FakeTelemetry::new(), ScriptedOracle::new());
        assert_eq!(
            engine.detector_names(),
            vec!["latency_regression", "error_rate", "failure_rate"]
        );
    }

    #[tokio::test]
    async fn test_empty_telemetry_yields_empty_list() {
        let ctx = AnalysisContext::new("production");
        let suggestions = engine(FakeTelemetry::new(), ScriptedOracle::new())
            .propose(&ctx)
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_all_detectors_concatenate_in_order() {
        let telemetry = FakeTelemetry::new()
            .with_latency("7d", vec![latency_row("/api/checkout", 300.0)])
            .with_latency("1h", vec![latency_row("/api/checkout", 600.0)])
            .with_error_count(75)
            .with_failure_rates(vec![MetricRow::new()
                .with(TRANSACTION_FIELD, "/api/refund")
                .with(FAILURE_RATE_FIELD, 0.2)]);
        let oracle = ScriptedOracle::new().reply(LEGITIMATE);
        let ctx = AnalysisContext::new("production");

        let suggestions = engine(telemetry, oracle).propose(&ctx).await.unwrap();
        let names: Vec<_> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Checkout p95 latency regression",
                "High error rate in production",
                "/api/refund high failure rate",
            ]
        );
        assert_eq!(ctx.metrics.suggestion_count(Flow::Historical), 3);
    }

    #[tokio::test]
    async fn test_error_count_scenario() {
        let telemetry = FakeTelemetry::new().with_error_count(75);
        let ctx = AnalysisContext::new("production");

        let suggestions = engine(telemetry, ScriptedOracle::new())
            .propose(&ctx)
            .await
            .unwrap();

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].dataset, "events");
        assert_eq!(suggestions[0].thresholds.warning, Some(30.0));
        assert_eq!(suggestions[0].thresholds.critical, Some(50.0));
    }

    #[tokio::test]
    async fn test_telemetry_failure_aborts_run() {
        let telemetry = FakeTelemetry::new().failing_on("event.type:error");
        let ctx = AnalysisContext::new("production");

        let err = engine(telemetry, ScriptedOracle::new())
            .propose(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::Request { .. }));
    }

    #[test]
    fn test_enforce_unique_names() {
        let ctx = AnalysisContext::new("production");
        let make = |name: &str| {
            AlertSuggestion::new(Flow::Historical, name, "transactions", "count()", "")
        };
        let kept = enforce_unique_names(vec![make("a"), make(""), make("b"), make("a")], &ctx);
        let names: Vec<_> = kept.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_name_rejection_reasons() {
        let mut seen = HashSet::new();
        assert_eq!(name_rejection("a", &mut seen), None);
        assert_eq!(name_rejection("  ", &mut seen), Some(dropped::EMPTY_NAME));
        assert_eq!(name_rejection("", &mut seen), Some(dropped::EMPTY_NAME));
        assert_eq!(name_rejection("a", &mut seen), Some(dropped::DUPLICATE_NAME));
        assert_eq!(seen.len(), 1);
    }
}
