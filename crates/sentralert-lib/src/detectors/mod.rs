//! Mechanical detectors of the historical analysis flow
//!
//! This module provides detection for:
//! - p95 latency regressions against a weekly baseline (oracle reviewed)
//! - Error-count spikes over the last hour
//! - Per-transaction failure rates over the last hour

mod error_rate;
mod failure_rate;
mod latency;

pub use error_rate::ErrorRateDetector;
pub use failure_rate::FailureRateDetector;
pub use latency::{LatencyRegressionDetector, LatencyVerdict};

use crate::config::AlertDefaults;
use crate::models::Action;

/// Window all "current" queries look back over
pub const CURRENT_WINDOW: &str = "1h";

/// Notification targets stamped on every mechanical suggestion
fn default_actions(defaults: &AlertDefaults) -> Vec<Action> {
    vec![Action::email(defaults.notify_email.clone())]
}
