//! Service/codebase cross-analysis
//!
//! A tool-calling model explores the codebase (DeepWiki) and production
//! traces (Sentry) on its own, then answers with a JSON document of proposed
//! alerts. The conversation loop is bounded by [`MAX_ITERATIONS`].

mod deepwiki;
mod tools;

pub use deepwiki::{repo_from_url, DeepWikiClient};
pub use tools::{sample_insights, AnalysisTool, CodebaseTool, TracesTool, CODEBASE_TOOL, TRACES_TOOL};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AlertDefaults;
use crate::engine::{enforce_unique_names, AnalysisContext, SuggestionSource};
use crate::error::Result;
use crate::models::{Action, AlertSuggestion, Flow, Thresholds, DEFAULT_TIME_WINDOW};
use crate::oracle::{extract_json, ContentBlock, Message, Role, StopReason, ToolCallingModel};
use crate::telemetry::{subject_filter, transaction_filter, TelemetrySource};

/// Model turns allowed before the analysis gives up
pub const MAX_ITERATIONS: usize = 10;

const DEFAULT_SEVERITY: &str = "HIGH";
const DEFAULT_AGGREGATE: &str = "count()";

/// Prompt flavour for one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnalysisScope {
    #[default]
    Comprehensive,
    /// Focus on a single endpoint, e.g. `POST /api/checkout`
    Endpoint(String),
    Quick,
}

impl AnalysisScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Endpoint(_) => "endpoint-specific",
            Self::Quick => "quick",
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Self::Comprehensive => COMPREHENSIVE_PROMPT.to_string(),
            Self::Endpoint(endpoint) => format!(
                "Analyze the specific endpoint: {endpoint}\n\n\
                 1. Use query_deepwiki_codebase to understand this endpoint's implementation\n\
                 2. Use query_sentry_traces to get its production metrics\n\
                 3. Propose appropriate monitoring alerts based on the analysis\n\n\
                 Provide response in JSON format with alert configuration."
            ),
            Self::Quick => QUICK_PROMPT.to_string(),
        }
    }
}

const COMPREHENSIVE_PROMPT: &str = r#"You are a service analysis agent. Your task is to analyze a production service by combining codebase insights with actual production metrics to propose intelligent monitoring alerts.

Follow this process:

1. **Discover the codebase**: Use query_deepwiki_codebase to understand:
   - What API endpoints exist
   - What services and dependencies are present
   - Any potential issues identified in the code

2. **Analyze production behavior**: Use query_sentry_traces to examine:
   - Which endpoints are currently monitored vs unmonitored
   - Performance characteristics (p50, p95 latency)
   - Error rates and failure patterns
   - Recent error events

3. **Synthesize insights**: Compare codebase analysis with production data to identify:
   - Critical unmonitored endpoints (especially payment, checkout, refund)
   - Endpoints with concerning performance patterns
   - Services calling external APIs without proper monitoring
   - Database operations without timeout alerts

4. **Propose alerts**: For each issue found, propose a Sentry metric alert with:
   - Clear justification based on both code and production data
   - Appropriate thresholds based on actual metrics
   - Proper severity level
   - Specific metric to monitor (p95, failure_rate, error_count, etc.)

**Output Format**: Provide your final analysis as a JSON object with this structure:
```json
{
  "analysis_summary": "Brief summary of findings",
  "alerts": [
    {
      "endpoint": "POST /api/checkout",
      "alert_name": "Checkout failure rate critical",
      "justification": "Codebase shows external payment API call without error handling. Production data shows 2.5% failure rate.",
      "alert_config": {
        "aggregate": "failure_rate()",
        "warning_threshold": 1.0,
        "critical_threshold": 2.0,
        "severity": "CRITICAL",
        "time_window": 5
      }
    }
  ],
  "insights": {
    "unmonitored_count": 3,
    "critical_endpoints": ["POST /api/checkout", "POST /api/refund"],
    "recommendations": ["Add timeout monitoring for PaymentService calls"]
  }
}
```

Begin your analysis now."#;

const QUICK_PROMPT: &str = "Perform a quick service analysis:

1. Query deepwiki for critical endpoints (payment, checkout, refund)
2. Query Sentry for their current monitoring status
3. Propose alerts for any unmonitored critical endpoints

Provide response in JSON format.";

/// One tool invocation made during the loop
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub iteration: usize,
    pub tool: String,
    pub input: Value,
    pub output: Value,
}

/// Everything one analysis produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReport {
    pub suggestions: Vec<AlertSuggestion>,
    pub summary: Option<String>,
    pub insights: Value,
    pub trace: Vec<ToolCall>,
    /// Why no suggestions could be read, if that happened
    pub error: Option<String>,
    pub raw_response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinalAnalysis {
    analysis_summary: Option<String>,
    #[serde(default)]
    alerts: Vec<Value>,
    #[serde(default)]
    insights: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ProposedAlert {
    endpoint: Option<String>,
    alert_name: Option<String>,
    #[serde(default)]
    justification: String,
    #[serde(default)]
    alert_config: ProposedConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ProposedConfig {
    aggregate: Option<String>,
    warning_threshold: Option<f64>,
    critical_threshold: Option<f64>,
    severity: Option<String>,
    time_window: Option<u32>,
}

/// Tool-augmented analysis flow
pub struct ServiceAnalysisAgent {
    model: Arc<dyn ToolCallingModel>,
    tools: Vec<Box<dyn AnalysisTool>>,
    defaults: AlertDefaults,
    scope: AnalysisScope,
}

impl ServiceAnalysisAgent {
    /// Agent with the standard codebase and traces tools
    pub fn new(
        model: Arc<dyn ToolCallingModel>,
        telemetry: Arc<dyn TelemetrySource>,
        deepwiki: DeepWikiClient,
        defaults: AlertDefaults,
    ) -> Self {
        Self::with_tools(
            model,
            vec![
                Box::new(CodebaseTool::new(deepwiki)),
                Box::new(TracesTool::new(telemetry)),
            ],
            defaults,
        )
    }

    pub fn with_tools(
        model: Arc<dyn ToolCallingModel>,
        tools: Vec<Box<dyn AnalysisTool>>,
        defaults: AlertDefaults,
    ) -> Self {
        Self {
            model,
            tools,
            defaults,
            scope: AnalysisScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: AnalysisScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> &AnalysisScope {
        &self.scope
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    async fn run_tool(&self, name: &str, input: &Value) -> Value {
        match self.tools.iter().find(|t| t.definition().name == name) {
            Some(tool) => tool.invoke(input).await,
            None => json!({ "error": format!("Unknown tool: {name}") }),
        }
    }

    /// Run the conversation loop
    ///
    /// Model transport failures propagate. A final answer that cannot be
    /// read yields a report with no suggestions and `error` set.
    pub async fn analyze(&self, ctx: &AnalysisContext) -> Result<AgentReport> {
        let definitions: Vec<_> = self.tools.iter().map(|t| t.definition()).collect();
        let mut messages = vec![Message::user_text(self.scope.prompt())];
        let mut trace = Vec::new();

        for iteration in 1..=MAX_ITERATIONS {
            let turn = self.model.converse(&messages, &definitions).await?;

            match turn.stop_reason {
                StopReason::EndTurn => {
                    let mut report = parse_final_response(&turn.text(), &ctx.environment, &self.defaults);
                    report.trace = trace;
                    return Ok(report);
                }
                StopReason::ToolUse => {
                    let requests: Vec<(String, String, Value)> = turn
                        .tool_uses()
                        .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                        .collect();
                    messages.push(turn.into_message());

                    let mut results = Vec::with_capacity(requests.len());
                    for (id, name, input) in requests {
                        ctx.logger.log_tool_call(iteration, &name, &input.to_string());
                        let output = self.run_tool(&name, &input).await;
                        results.push(ContentBlock::ToolResult {
                            tool_use_id: id,
                            content: serde_json::to_string_pretty(&output)?,
                        });
                        trace.push(ToolCall {
                            iteration,
                            tool: name,
                            input,
                            output,
                        });
                    }
                    messages.push(Message {
                        role: Role::User,
                        content: results,
                    });
                }
                StopReason::Other(reason) => {
                    return Ok(AgentReport {
                        trace,
                        error: Some(format!("Unexpected stop reason: {reason}")),
                        ..AgentReport::default()
                    });
                }
            }
        }

        Ok(AgentReport {
            trace,
            error: Some("Max iterations reached".to_string()),
            ..AgentReport::default()
        })
    }
}

/// Read the model's final answer into suggestions
///
/// Entries without a name or a critical threshold are dropped.
pub fn parse_final_response(text: &str, environment: &str, defaults: &AlertDefaults) -> AgentReport {
    let analysis = extract_json(text).parse::<FinalAnalysis>();
    let analysis = match analysis {
        Ok(analysis) => analysis,
        Err(e) => {
            return AgentReport {
                error: Some(format!("Failed to parse response: {e}")),
                raw_response: Some(text.to_string()),
                ..AgentReport::default()
            }
        }
    };

    let suggestions = analysis
        .alerts
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<ProposedAlert>(entry).ok())
        .filter_map(|alert| to_suggestion(alert, environment, defaults))
        .collect();

    AgentReport {
        suggestions,
        summary: analysis.analysis_summary,
        insights: analysis.insights,
        ..AgentReport::default()
    }
}

fn to_suggestion(alert: ProposedAlert, environment: &str, defaults: &AlertDefaults) -> Option<AlertSuggestion> {
    let name = alert.alert_name.filter(|n| !n.trim().is_empty())?;
    let config = alert.alert_config;
    let critical = config.critical_threshold?;

    let aggregate = config
        .aggregate
        .unwrap_or_else(|| DEFAULT_AGGREGATE.to_string());
    let dataset = if aggregate.contains("transaction.duration") {
        "transactions"
    } else {
        "events"
    };
    let query = match alert.endpoint.as_deref() {
        Some(endpoint) if !endpoint.is_empty() => subject_filter(endpoint, environment),
        _ => transaction_filter(environment),
    };

    Some(
        AlertSuggestion::new(Flow::ServiceAnalysisAgent, name, dataset, aggregate, query)
            .with_environment(environment)
            .with_time_window(config.time_window.unwrap_or(DEFAULT_TIME_WINDOW))
            .with_thresholds(Thresholds::new(config.warning_threshold, critical))
            .with_justification(alert.justification)
            .with_severity(config.severity.unwrap_or_else(|| DEFAULT_SEVERITY.to_string()))
            .with_actions(vec![Action::email(defaults.notify_email.clone())]),
    )
}

#[async_trait]
impl SuggestionSource for ServiceAnalysisAgent {
    fn flow(&self) -> Flow {
        Flow::ServiceAnalysisAgent
    }

    async fn propose(&self, ctx: &AnalysisContext) -> Result<Vec<AlertSuggestion>> {
        let started = Instant::now();
        ctx.logger.log_run_started(Flow::ServiceAnalysisAgent, &ctx.environment);

        let report = self.analyze(ctx).await?;
        if let Some(error) = &report.error {
            tracing::warn!(
                event = "agent_incomplete",
                run_id = %ctx.logger.run_id(),
                error = %error,
                tool_calls = report.trace.len(),
                "Service analysis produced no readable answer"
            );
        }

        let suggestions = enforce_unique_names(report.suggestions, ctx);
        for suggestion in &suggestions {
            ctx.metrics.inc_suggestion(Flow::ServiceAnalysisAgent);
            ctx.logger.log_suggestion(Flow::ServiceAnalysisAgent, &suggestion.name);
        }

        let elapsed = started.elapsed().as_secs_f64();
        ctx.metrics.observe_run_duration(elapsed);
        ctx.logger
            .log_run_finished(Flow::ServiceAnalysisAgent, suggestions.len(), elapsed);
        Ok(suggestions)
    }
}
