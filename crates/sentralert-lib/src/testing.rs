//! In-memory collaborators for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{AlertError, Result};
use crate::models::{AlertRulePayload, ExistingRule, MetricRow};
use crate::oracle::{JudgmentOracle, Message, ModelTurn, ToolCallingModel, ToolDefinition};
use crate::reconciler::RuleBackend;
use crate::telemetry::{
    TelemetrySource, COUNT_FIELD, FAILURE_RATE_FIELD, P95_DURATION_FIELD,
};

struct Canned {
    field: &'static str,
    filter: &'static str,
    window: &'static str,
    rows: Vec<MetricRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub fields: Vec<String>,
    pub filter: String,
    pub time_window: String,
}

/// Telemetry answering canned rows by (field, filter fragment, window)
#[derive(Default)]
pub struct FakeTelemetry {
    canned: Vec<Canned>,
    failing_filter: Option<&'static str>,
    calls: Mutex<Vec<RecordedQuery>>,
}

impl FakeTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        mut self,
        field: &'static str,
        filter: &'static str,
        window: &'static str,
        rows: Vec<MetricRow>,
    ) -> Self {
        self.canned.push(Canned {
            field,
            filter,
            window,
            rows,
        });
        self
    }

    pub fn with_latency(self, window: &'static str, rows: Vec<MetricRow>) -> Self {
        self.respond(P95_DURATION_FIELD, "event.type:transaction", window, rows)
    }

    pub fn with_error_count(self, count: u64) -> Self {
        self.respond(
            COUNT_FIELD,
            "event.type:error",
            "1h",
            vec![MetricRow::new().with(COUNT_FIELD, count)],
        )
    }

    pub fn with_failure_rates(self, rows: Vec<MetricRow>) -> Self {
        self.respond(FAILURE_RATE_FIELD, "event.type:transaction", "1h", rows)
    }

    /// Fail every query whose filter contains `filter`
    pub fn failing_on(mut self, filter: &'static str) -> Self {
        self.failing_filter = Some(filter);
        self
    }

    pub fn calls(&self) -> Vec<RecordedQuery> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetrySource for FakeTelemetry {
    async fn query(&self, fields: &[&str], filter: &str, time_window: &str) -> Result<Vec<MetricRow>> {
        self.calls.lock().unwrap().push(RecordedQuery {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            filter: filter.to_string(),
            time_window: time_window.to_string(),
        });

        if self.failing_filter.is_some_and(|f| filter.contains(f)) {
            return Err(AlertError::Request {
                endpoint: "discover".to_string(),
                status: 500,
                body: "upstream unavailable".to_string(),
            });
        }

        Ok(self
            .canned
            .iter()
            .find(|c| {
                fields.contains(&c.field) && filter.contains(c.filter) && c.window == time_window
            })
            .map(|c| c.rows.clone())
            .unwrap_or_default())
    }
}

/// Oracle replaying queued answers, failing once the queue is empty
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self) -> Self {
        self.replies.lock().unwrap().push_back(Err(AlertError::Request {
            endpoint: "v1/messages".to_string(),
            status: 529,
            body: "overloaded".to_string(),
        }));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl JudgmentOracle for ScriptedOracle {
    async fn analyze(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AlertError::MalformedOracleResponse("no scripted reply".into())))
    }
}

/// Tool-calling model replaying queued turns
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ModelTurn>>,
    conversations: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turn(self, turn: ModelTurn) -> Self {
        self.turns.lock().unwrap().push_back(turn);
        self
    }

    /// Conversations as they were sent, one per call
    pub fn conversations(&self) -> Vec<Vec<Message>> {
        self.conversations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCallingModel for ScriptedModel {
    async fn converse(&self, messages: &[Message], _tools: &[ToolDefinition]) -> Result<ModelTurn> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AlertError::MalformedOracleResponse("no scripted turn".into()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Backend call as recorded by [`FakeBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Create { project: String, name: String },
    Update { project: String, rule_id: String, name: String },
}

/// Rule backend holding rules in memory
#[derive(Default)]
pub struct FakeBackend {
    projects: Vec<String>,
    rules: Mutex<Vec<ExistingRule>>,
    rejected_names: Vec<String>,
    calls: Mutex<Vec<BackendCall>>,
}

impl FakeBackend {
    pub fn new(projects: &[&str]) -> Self {
        Self {
            projects: projects.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_rule(self, id: &str, name: &str) -> Self {
        self.rules.lock().unwrap().push(ExistingRule {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Answer 400 to submissions with this rule name
    pub fn rejecting(mut self, name: &str) -> Self {
        self.rejected_names.push(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, payload: &AlertRulePayload) -> Result<()> {
        if self.rejected_names.contains(&payload.name) {
            return Err(AlertError::Request {
                endpoint: "alert-rules".to_string(),
                status: 400,
                body: "{\"aggregate\": [\"Invalid aggregate\"]}".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RuleBackend for FakeBackend {
    async fn list_projects(&self) -> Result<Vec<String>> {
        Ok(self.projects.clone())
    }

    async fn list_rules(&self, _project: &str) -> Result<Vec<ExistingRule>> {
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn create_rule(&self, project: &str, payload: &AlertRulePayload) -> Result<String> {
        self.check(payload)?;
        let mut rules = self.rules.lock().unwrap();
        let id = (1000 + rules.len()).to_string();
        rules.push(ExistingRule {
            id: id.clone(),
            name: payload.name.clone(),
        });
        self.calls.lock().unwrap().push(BackendCall::Create {
            project: project.to_string(),
            name: payload.name.clone(),
        });
        Ok(id)
    }

    async fn update_rule(&self, project: &str, rule_id: &str, payload: &AlertRulePayload) -> Result<String> {
        self.check(payload)?;
        self.calls.lock().unwrap().push(BackendCall::Update {
            project: project.to_string(),
            rule_id: rule_id.to_string(),
            name: payload.name.clone(),
        });
        Ok(rule_id.to_string())
    }
}
