//! Observability for alert-proposal runs
//!
//! Provides:
//! - Prometheus counters for detections, oracle verdicts, proposals and applies
//! - Structured logging with tracing

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{Detection, Flow};

/// Buckets for whole-run durations (in seconds)
const RUN_DURATION_BUCKETS: &[f64] = &[1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Oracle verdict outcomes
pub mod verdict {
    pub const ACCEPTED: &str = "accepted";
    pub const REJECTED: &str = "rejected";
    pub const MALFORMED: &str = "malformed";
    pub const UNAVAILABLE: &str = "unavailable";
}

/// Why a suggestion was dropped before persistence
pub mod dropped {
    pub const EMPTY_NAME: &str = "empty_name";
    pub const DUPLICATE_NAME: &str = "duplicate_name";
}

/// Apply outcomes
pub mod apply {
    pub const CREATED: &str = "created";
    pub const UPDATED: &str = "updated";
    pub const SKIPPED: &str = "skipped";
    pub const FAILED: &str = "failed";
}

struct RunMetricsInner {
    registry: Registry,
    detections: IntCounterVec,
    oracle_verdicts: IntCounterVec,
    suggestions_proposed: IntCounterVec,
    rules_applied: IntCounterVec,
    run_duration_seconds: Histogram,
}

/// Metrics for one process run
///
/// Each handle owns its registry, so independent runs (and tests) never
/// collide. Clones share the same counters.
#[derive(Clone)]
pub struct RunMetrics {
    inner: Arc<RunMetricsInner>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("sentralert".to_string()), None)
            .expect("Failed to create metrics registry");

        let detections = IntCounterVec::new(
            Opts::new("detections_total", "Raw detections raised by detectors"),
            &["metric_kind"],
        )
        .expect("Failed to create detections_total");

        let oracle_verdicts = IntCounterVec::new(
            Opts::new("oracle_verdicts_total", "Oracle review outcomes"),
            &["outcome"],
        )
        .expect("Failed to create oracle_verdicts_total");

        let suggestions_proposed = IntCounterVec::new(
            Opts::new("suggestions_proposed_total", "Alert suggestions proposed"),
            &["flow"],
        )
        .expect("Failed to create suggestions_proposed_total");

        let rules_applied = IntCounterVec::new(
            Opts::new("rules_applied_total", "Alert rule apply outcomes"),
            &["outcome"],
        )
        .expect("Failed to create rules_applied_total");

        let run_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("run_duration_seconds", "Wall-clock duration of a run")
                .buckets(RUN_DURATION_BUCKETS.to_vec()),
        )
        .expect("Failed to create run_duration_seconds");

        registry
            .register(Box::new(detections.clone()))
            .expect("Failed to register detections_total");
        registry
            .register(Box::new(oracle_verdicts.clone()))
            .expect("Failed to register oracle_verdicts_total");
        registry
            .register(Box::new(suggestions_proposed.clone()))
            .expect("Failed to register suggestions_proposed_total");
        registry
            .register(Box::new(rules_applied.clone()))
            .expect("Failed to register rules_applied_total");
        registry
            .register(Box::new(run_duration_seconds.clone()))
            .expect("Failed to register run_duration_seconds");

        Self {
            inner: Arc::new(RunMetricsInner {
                registry,
                detections,
                oracle_verdicts,
                suggestions_proposed,
                rules_applied,
                run_duration_seconds,
            }),
        }
    }

    pub fn inc_detection(&self, metric_kind: &str) {
        self.inner.detections.with_label_values(&[metric_kind]).inc();
    }

    pub fn inc_oracle_verdict(&self, outcome: &str) {
        self.inner.oracle_verdicts.with_label_values(&[outcome]).inc();
    }

    pub fn inc_suggestion(&self, flow: Flow) {
        self.inner
            .suggestions_proposed
            .with_label_values(&[flow.as_str()])
            .inc();
    }

    pub fn inc_rule_applied(&self, outcome: &str) {
        self.inner.rules_applied.with_label_values(&[outcome]).inc();
    }

    pub fn observe_run_duration(&self, duration_secs: f64) {
        self.inner.run_duration_seconds.observe(duration_secs);
    }

    pub fn oracle_verdict_count(&self, outcome: &str) -> u64 {
        self.inner.oracle_verdicts.with_label_values(&[outcome]).get()
    }

    pub fn suggestion_count(&self, flow: Flow) -> u64 {
        self.inner
            .suggestions_proposed
            .with_label_values(&[flow.as_str()])
            .get()
    }

    pub fn rule_applied_count(&self, outcome: &str) -> u64 {
        self.inner.rules_applied.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.inner.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Structured logger for run events
///
/// Every event carries the run identifier so one run's lines can be
/// grouped together.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// Logger whose run identifier is derived from the current time
    pub fn for_new_run() -> Self {
        Self::new(chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_started(&self, flow: Flow, environment: &str) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            flow = %flow,
            environment = %environment,
            "Alert analysis started"
        );
    }

    pub fn log_run_finished(&self, flow: Flow, suggestions: usize, duration_secs: f64) {
        info!(
            event = "run_finished",
            run_id = %self.run_id,
            flow = %flow,
            suggestions = suggestions,
            duration_secs = duration_secs,
            "Alert analysis finished"
        );
    }

    pub fn log_detection(&self, detection: &Detection) {
        info!(
            event = "detection",
            run_id = %self.run_id,
            subject = %detection.subject,
            metric_kind = detection.metric_kind.as_str(),
            baseline = ?detection.baseline_value,
            current = detection.current_value,
            environment = %detection.environment,
            "Anomaly detected"
        );
    }

    pub fn log_suggestion(&self, flow: Flow, name: &str) {
        info!(
            event = "suggestion_proposed",
            run_id = %self.run_id,
            flow = %flow,
            name = %name,
            "Proposed alert"
        );
    }

    pub fn log_suggestion_skipped(&self, subject: &str, reason: &str) {
        info!(
            event = "suggestion_skipped",
            run_id = %self.run_id,
            subject = %subject,
            reason = %reason,
            "Skipped alert proposal"
        );
    }

    pub fn log_oracle_failure(&self, subject: &str, error: &str) {
        warn!(
            event = "oracle_failure",
            run_id = %self.run_id,
            subject = %subject,
            error = %error,
            "Oracle review failed, dropping suggestion"
        );
    }

    pub fn log_dropped_name(&self, name: &str, reason: &str) {
        warn!(
            event = "suggestion_dropped",
            run_id = %self.run_id,
            name = %name,
            reason = reason,
            "Dropped suggestion that breaks name uniqueness"
        );
    }

    pub fn log_tool_call(&self, iteration: usize, tool: &str, input: &str) {
        debug!(
            event = "tool_call",
            run_id = %self.run_id,
            iteration = iteration,
            tool = %tool,
            input = %input,
            "Agent called tool"
        );
    }

    pub fn log_rule_applied(&self, name: &str, project: &str, outcome: &str, rule_id: &str) {
        info!(
            event = "rule_applied",
            run_id = %self.run_id,
            name = %name,
            project = %project,
            outcome = %outcome,
            rule_id = %rule_id,
            "Applied alert rule"
        );
    }

    pub fn log_apply_failure(&self, item: &str, error: &str) {
        warn!(
            event = "apply_failed",
            run_id = %self.run_id,
            item = %item,
            error = %error,
            "Failed to apply alert rule"
        );
    }
}
