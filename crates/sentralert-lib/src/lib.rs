//! Alert proposal engine for Sentry
//!
//! This crate provides the core functionality for:
//! - Telemetry queries against Sentry Discover
//! - Historical detectors (latency regression, error rate, failure rate)
//! - A tool-calling service analysis agent
//! - Normalization, YAML persistence and rule reconciliation
//! - Structured logging and Prometheus metrics

pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod observability;
pub mod oracle;
pub mod persistence;
pub mod reconciler;
pub mod sentry;
pub mod service_analysis;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AlertDefaults, AppConfig};
pub use engine::{AnalysisContext, HistoricalAnalysis, SuggestionSource, DEFAULT_ENVIRONMENT};
pub use error::{AlertError, Result};
pub use models::*;
pub use observability::{RunMetrics, StructuredLogger};
pub use persistence::SuggestionStore;
pub use reconciler::{BatchReport, Reconciler, RuleBackend};
pub use sentry::SentryClient;
pub use service_analysis::{AnalysisScope, ServiceAnalysisAgent};
