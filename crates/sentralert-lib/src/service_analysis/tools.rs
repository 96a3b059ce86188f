//! Read-only tools offered to the service analysis model

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::deepwiki::DeepWikiClient;
use crate::models::MetricRow;
use crate::oracle::ToolDefinition;
use crate::telemetry::{
    TelemetrySource, COUNT_FIELD, FAILURE_RATE_FIELD, P50_DURATION_FIELD, P95_DURATION_FIELD,
    TRANSACTION_FIELD,
};

pub const CODEBASE_TOOL: &str = "query_deepwiki_codebase";
pub const TRACES_TOOL: &str = "query_sentry_traces";

const DEFAULT_STATS_PERIOD: &str = "24h";

/// A tool the model may call; failures are reported inside the result
#[async_trait]
pub trait AnalysisTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn invoke(&self, input: &Value) -> Value;
}

/// Codebase insights from DeepWiki
pub struct CodebaseTool {
    deepwiki: DeepWikiClient,
}

impl CodebaseTool {
    pub fn new(deepwiki: DeepWikiClient) -> Self {
        Self { deepwiki }
    }
}

#[async_trait]
impl AnalysisTool for CodebaseTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: CODEBASE_TOOL.to_string(),
            description: "Query the deepwiki MCP server to get insights about the application \
                codebase. Use this to discover endpoints, services, dependencies, and potential \
                issues. Returns structured JSON with codebase information including API \
                endpoints, service architecture, and code organization."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language query about the codebase. Examples: \
                            'What API endpoints exist?', 'Show me payment-related services', \
                            'What are the external dependencies?'"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, input: &Value) -> Value {
        let query = input.get("query").and_then(Value::as_str).unwrap_or_default();

        match self.deepwiki.ask_question(query).await {
            Ok(answer) => {
                // Structured answers are kept as-is, prose is wrapped
                let insights = match serde_json::from_str::<Value>(&answer) {
                    Ok(parsed) => parsed,
                    Err(_) => json!({ "analysis": answer }),
                };
                json!({
                    "query": query,
                    "codebase_insights": insights,
                    "metadata": {"repo": self.deepwiki.repo(), "source": "deepwiki_mcp"},
                })
            }
            Err(e) => {
                warn!(error = %e, "DeepWiki unavailable, answering with sample insights");
                sample_insights(query, self.deepwiki.repo(), &e.to_string())
            }
        }
    }
}

/// Fixed sample used when DeepWiki cannot be reached
pub fn sample_insights(query: &str, repo: &str, reason: &str) -> Value {
    json!({
        "query": query,
        "codebase_insights": {
            "endpoints": [
                {"path": "/api/checkout", "method": "POST", "description": "Process customer checkout", "monitored": false},
                {"path": "/api/refund", "method": "POST", "description": "Process refund requests", "monitored": false},
                {"path": "/api/orders/{id}", "method": "GET", "description": "Retrieve order details", "monitored": true}
            ],
            "services": [
                {"name": "PaymentService", "external_api": true},
                {"name": "OrderService", "database": "postgresql"}
            ],
            "code_structure": {"framework": "FastAPI", "language": "Python", "api_version": "v1"},
            "dependencies": ["stripe", "postgresql", "redis"],
            "potential_issues": [
                "No error handling on /api/checkout payment processing",
                "Missing timeout configuration for external API calls"
            ]
        },
        "metadata": {
            "repo": repo,
            "note": format!("Mock data (MCP connection failed: {reason})"),
            "source": "fallback_mock"
        }
    })
}

/// Production transaction metrics and error events
pub struct TracesTool {
    telemetry: Arc<dyn TelemetrySource>,
}

impl TracesTool {
    pub fn new(telemetry: Arc<dyn TelemetrySource>) -> Self {
        Self { telemetry }
    }

    async fn collect(
        &self,
        endpoint: Option<&str>,
        period: &str,
        include_errors: bool,
    ) -> crate::error::Result<(Vec<MetricRow>, Vec<MetricRow>)> {
        let (tx_filter, error_filter) = match endpoint {
            Some(path) => (
                format!("event.type:transaction transaction:\"{path}\""),
                format!("event.type:error transaction:\"{path}\""),
            ),
            None => ("event.type:transaction".to_string(), "event.type:error".to_string()),
        };

        let transactions = self
            .telemetry
            .query(
                &[
                    TRANSACTION_FIELD,
                    P50_DURATION_FIELD,
                    P95_DURATION_FIELD,
                    COUNT_FIELD,
                    FAILURE_RATE_FIELD,
                ],
                &tx_filter,
                period,
            )
            .await?;

        let errors = if include_errors {
            self.telemetry
                .query(&["title", COUNT_FIELD, "last_seen()"], &error_filter, period)
                .await?
        } else {
            Vec::new()
        };
        Ok((transactions, errors))
    }
}

#[async_trait]
impl AnalysisTool for TracesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TRACES_TOOL.to_string(),
            description: "Query Sentry API to get trace data and performance metrics for service \
                endpoints. Use this to analyze actual production behavior, performance \
                characteristics, and error patterns. Returns transaction traces, performance \
                metrics (p50, p95), error rates, and recent error events."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "endpoint_path": {
                        "type": "string",
                        "description": "Specific endpoint to query (e.g., 'POST /api/checkout'). \
                            Leave empty to query all endpoints."
                    },
                    "stats_period": {
                        "type": "string",
                        "description": "Time period for stats (e.g., '1h', '24h', '7d'). Default: '24h'",
                        "default": DEFAULT_STATS_PERIOD
                    },
                    "include_errors": {
                        "type": "boolean",
                        "description": "Whether to include error events in the response. Default: true",
                        "default": true
                    }
                },
                "required": []
            }),
        }
    }

    async fn invoke(&self, input: &Value) -> Value {
        let endpoint = input
            .get("endpoint_path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty());
        let period = input
            .get("stats_period")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_STATS_PERIOD);
        let include_errors = input
            .get("include_errors")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let query = json!({"endpoint": endpoint.unwrap_or("all"), "period": period});

        let (transactions, errors) = match self.collect(endpoint, period, include_errors).await {
            Ok(rows) => rows,
            Err(e) => {
                return json!({
                    "error": format!("Failed to query Sentry: {e}"),
                    "query": query,
                })
            }
        };

        let field = |row: &MetricRow, name: &str| row.get(name).cloned().unwrap_or(Value::Null);
        json!({
            "query": query,
            "transactions": transactions.iter().map(|tx| json!({
                "name": field(tx, TRANSACTION_FIELD),
                "metrics": {
                    "p50_duration_ms": field(tx, P50_DURATION_FIELD),
                    "p95_duration_ms": field(tx, P95_DURATION_FIELD),
                    "count": field(tx, COUNT_FIELD),
                    "failure_rate": field(tx, FAILURE_RATE_FIELD),
                }
            })).collect::<Vec<_>>(),
            "errors": errors.iter().map(|err| json!({
                "title": field(err, "title"),
                "count": field(err, COUNT_FIELD),
                "last_seen": field(err, "last_seen()"),
            })).collect::<Vec<_>>(),
            "summary": {
                "total_transactions": transactions.len(),
                "total_errors": errors.len(),
                "monitored": !transactions.is_empty(),
            }
        })
    }
}
