//! Telemetry source abstraction

use async_trait::async_trait;

use crate::error::Result;
use crate::models::MetricRow;

/// Field holding the grouping key of transaction queries
pub const TRANSACTION_FIELD: &str = "transaction";
pub const P95_DURATION_FIELD: &str = "p95(transaction.duration)";
pub const P50_DURATION_FIELD: &str = "p50(transaction.duration)";
pub const COUNT_FIELD: &str = "count()";
pub const FAILURE_RATE_FIELD: &str = "failure_rate()";

/// Returns aggregate rows for a metric query over a time window
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Query `fields` for events matching `filter` over `time_window`
    /// (for example `"1h"` or `"7d"`)
    async fn query(&self, fields: &[&str], filter: &str, time_window: &str) -> Result<Vec<MetricRow>>;
}

/// Filter matching transaction events in an environment
pub fn transaction_filter(environment: &str) -> String {
    format!("event.type:transaction environment:{environment}")
}

/// Filter matching one transaction in an environment
pub fn subject_filter(subject: &str, environment: &str) -> String {
    format!("event.type:transaction transaction:\"{subject}\" environment:{environment}")
}

/// Filter matching error events in an environment
pub fn error_filter(environment: &str) -> String {
    format!("event.type:error environment:{environment}")
}
