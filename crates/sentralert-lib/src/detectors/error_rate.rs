//! Error-count spike detection

use async_trait::async_trait;
use std::sync::Arc;

use super::{default_actions, CURRENT_WINDOW};
use crate::config::AlertDefaults;
use crate::engine::{AnalysisContext, Detector};
use crate::error::Result;
use crate::models::{AlertSuggestion, Detection, Flow, MetricKind, Thresholds};
use crate::telemetry::{error_filter, TelemetrySource, COUNT_FIELD};

/// Errors per hour above which an alert is proposed
const DEFAULT_SPIKE_THRESHOLD: f64 = 50.0;

const WARNING_THRESHOLD: f64 = 30.0;
const CRITICAL_THRESHOLD: f64 = 50.0;

/// Proposes one environment-wide alert when the hourly error count spikes
pub struct ErrorRateDetector {
    telemetry: Arc<dyn TelemetrySource>,
    defaults: AlertDefaults,
    /// Hourly error count that must be exceeded
    pub spike_threshold: f64,
}

impl ErrorRateDetector {
    pub fn new(telemetry: Arc<dyn TelemetrySource>, defaults: AlertDefaults) -> Self {
        Self {
            telemetry,
            defaults,
            spike_threshold: DEFAULT_SPIKE_THRESHOLD,
        }
    }

    pub fn with_spike_threshold(mut self, threshold: f64) -> Self {
        self.spike_threshold = threshold;
        self
    }

    /// Raise a detection when `count` exceeds the threshold (exclusive)
    pub fn evaluate(&self, count: f64, environment: &str) -> Option<Detection> {
        (count > self.spike_threshold).then(|| Detection {
            subject: environment.to_string(),
            metric_kind: MetricKind::ErrorCount,
            baseline_value: None,
            current_value: count,
            environment: environment.to_string(),
        })
    }

    pub fn build_suggestion(&self, detection: &Detection) -> AlertSuggestion {
        AlertSuggestion::new(
            Flow::Historical,
            format!("High error rate in {}", detection.environment),
            "events",
            COUNT_FIELD,
            error_filter(&detection.environment),
        )
        .with_environment(detection.environment.clone())
        .with_thresholds(Thresholds::new(Some(WARNING_THRESHOLD), CRITICAL_THRESHOLD))
        .with_justification(format!(
            "Detected {} errors in the last hour, which exceeds normal baseline.",
            detection.current_value
        ))
        .with_severity("HIGH")
        .with_actions(default_actions(&self.defaults))
    }
}

#[async_trait]
impl Detector for ErrorRateDetector {
    fn name(&self) -> &'static str {
        "error_rate"
    }

    async fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<AlertSuggestion>> {
        let rows = self
            .telemetry
            .query(&[COUNT_FIELD], &error_filter(&ctx.environment), CURRENT_WINDOW)
            .await?;

        // Ungrouped query: the first row carries the total
        let Some(count) = rows.first().and_then(|row| row.f64_field(COUNT_FIELD)) else {
            return Ok(Vec::new());
        };

        let Some(detection) = self.evaluate(count, &ctx.environment) else {
            return Ok(Vec::new());
        };

        ctx.metrics.inc_detection(detection.metric_kind.as_str());
        ctx.logger.log_detection(&detection);
        let suggestion = self.build_suggestion(&detection);
        ctx.logger.log_suggestion(Flow::Historical, &suggestion.name);
        Ok(vec![suggestion])
    }
}
