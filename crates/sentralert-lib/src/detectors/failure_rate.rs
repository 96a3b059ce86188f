//! Per-transaction failure-rate detection

use async_trait::async_trait;
use std::sync::Arc;

use super::{default_actions, CURRENT_WINDOW};
use crate::config::AlertDefaults;
use crate::engine::{AnalysisContext, Detector};
use crate::error::Result;
use crate::models::{AlertSuggestion, Detection, Flow, MetricKind, MetricRow, Thresholds};
use crate::telemetry::{
    subject_filter, transaction_filter, TelemetrySource, FAILURE_RATE_FIELD, TRANSACTION_FIELD,
};

/// Failure ratio above which a transaction gets an alert
const DEFAULT_RATE_THRESHOLD: f64 = 0.05;

const WARNING_THRESHOLD: f64 = 0.03;
const CRITICAL_THRESHOLD: f64 = 0.05;

/// Proposes an alert for every transaction failing too often
pub struct FailureRateDetector {
    telemetry: Arc<dyn TelemetrySource>,
    defaults: AlertDefaults,
    pub rate_threshold: f64,
}

impl FailureRateDetector {
    pub fn new(telemetry: Arc<dyn TelemetrySource>, defaults: AlertDefaults) -> Self {
        Self {
            telemetry,
            defaults,
            rate_threshold: DEFAULT_RATE_THRESHOLD,
        }
    }

    pub fn with_rate_threshold(mut self, threshold: f64) -> Self {
        self.rate_threshold = threshold;
        self
    }

    /// Detection for one row, if its rate exceeds the threshold (exclusive)
    pub fn evaluate(&self, row: &MetricRow, environment: &str) -> Option<Detection> {
        let subject = row.str_field(TRANSACTION_FIELD)?;
        let rate = row.f64_field(FAILURE_RATE_FIELD)?;
        (rate > self.rate_threshold).then(|| Detection {
            subject: subject.to_string(),
            metric_kind: MetricKind::FailureRate,
            baseline_value: None,
            current_value: rate,
            environment: environment.to_string(),
        })
    }

    pub fn build_suggestion(&self, detection: &Detection) -> AlertSuggestion {
        AlertSuggestion::new(
            Flow::Historical,
            format!("{} high failure rate", detection.subject),
            "transactions",
            FAILURE_RATE_FIELD,
            subject_filter(&detection.subject, &detection.environment),
        )
        .with_environment(detection.environment.clone())
        .with_thresholds(Thresholds::new(Some(WARNING_THRESHOLD), CRITICAL_THRESHOLD))
        .with_justification(format!(
            "Current failure rate is {:.1}%, which is critically high for a user-facing endpoint.",
            detection.current_value * 100.0
        ))
        .with_severity("CRITICAL")
        .with_actions(default_actions(&self.defaults))
    }
}

#[async_trait]
impl Detector for FailureRateDetector {
    fn name(&self) -> &'static str {
        "failure_rate"
    }

    async fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<AlertSuggestion>> {
        let rows = self
            .telemetry
            .query(
                &[TRANSACTION_FIELD, FAILURE_RATE_FIELD],
                &transaction_filter(&ctx.environment),
                CURRENT_WINDOW,
            )
            .await?;

        let mut suggestions = Vec::new();
        for detection in rows.iter().filter_map(|row| self.evaluate(row, &ctx.environment)) {
            ctx.metrics.inc_detection(detection.metric_kind.as_str());
            ctx.logger.log_detection(&detection);
            let suggestion = self.build_suggestion(&detection);
            ctx.logger.log_suggestion(Flow::Historical, &suggestion.name);
            suggestions.push(suggestion);
        }
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTelemetry;

    fn rate(subject: &str, value: f64) -> MetricRow {
        MetricRow::new()
            .with(TRANSACTION_FIELD, subject)
            .with(FAILURE_RATE_FIELD, value)
    }

    #[tokio::test]
    async fn test_every_subject_above_threshold_is_proposed() {
        let telemetry = FakeTelemetry::new().with_failure_rates(vec![
            rate("/api/checkout", 0.12),
            rate("/api/health", 0.05),
            rate("/api/refund", 0.051),
            rate("/api/search", 0.01),
        ]);
        let detector = FailureRateDetector::new(Arc::new(telemetry), AlertDefaults::default());
        let ctx = AnalysisContext::new("production");

        let found = detector.detect(&ctx).await.unwrap();
        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["/api/checkout high failure rate", "/api/refund high failure rate"]
        );

        let first = &found[0];
        assert_eq!(first.aggregate, "failure_rate()");
        assert_eq!(first.dataset, "transactions");
        assert_eq!(first.severity, "CRITICAL");
        assert_eq!(first.thresholds, Thresholds::new(Some(0.03), 0.05));
        assert_eq!(
            first.justification,
            "Current failure rate is 12.0%, which is critically high for a user-facing endpoint."
        );
        assert_eq!(
            first.query,
            "event.type:transaction transaction:\"/api/checkout\" environment:production"
        );
    }

    #[test]
    fn test_rows_without_subject_are_ignored() {
        let detector = FailureRateDetector::new(Arc::new(FakeTelemetry::new()), AlertDefaults::default());
        let row = MetricRow::new().with(FAILURE_RATE_FIELD, 0.5);
        assert!(detector.evaluate(&row, "production").is_none());
    }
}
