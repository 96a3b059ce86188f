//! Sentry API client
//!
//! Implements both collaborator seams the engine talks to:
//! - [`TelemetrySource`] over the Discover events endpoint
//! - [`RuleBackend`] over the project metric alert-rule endpoints

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::config::SentrySettings;
use crate::error::Result;
use crate::models::{AlertRulePayload, ExistingRule, MetricRow};
use crate::reconciler::RuleBackend;
use crate::telemetry::TelemetrySource;
use http::SentryHttp;

/// Rows requested per Discover query
const DISCOVER_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    #[serde(default)]
    data: Vec<MetricRow>,
}

#[derive(Debug, Deserialize)]
struct ProjectRecord {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct RuleRecord {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    #[serde(default)]
    name: String,
}

/// Sentry returns identifiers as strings, older endpoints as numbers
fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected rule id {other}"))),
    }
}

/// Client for one Sentry organization
pub struct SentryClient {
    http: SentryHttp,
    org_slug: String,
    project_slug: Option<String>,
}

impl SentryClient {
    pub fn new(settings: &SentrySettings) -> Result<Self> {
        Ok(Self {
            http: SentryHttp::new(settings)?,
            org_slug: settings.org_slug.clone(),
            project_slug: settings.project_slug.clone(),
        })
    }

    pub fn org_slug(&self) -> &str {
        &self.org_slug
    }

    fn rules_path(&self, project: &str) -> String {
        format!("projects/{}/{}/alert-rules/", self.org_slug, project)
    }
}

#[async_trait]
impl TelemetrySource for SentryClient {
    async fn query(&self, fields: &[&str], filter: &str, time_window: &str) -> Result<Vec<MetricRow>> {
        let path = format!("organizations/{}/events/", self.org_slug);

        let mut params = vec![
            ("statsPeriod", time_window.to_string()),
            ("query", filter.to_string()),
            ("per_page", DISCOVER_PAGE_SIZE.to_string()),
        ];
        params.extend(fields.iter().map(|field| ("field", field.to_string())));

        debug!(filter = %filter, time_window = %time_window, fields = ?fields, "Querying Discover");
        let response: DiscoverResponse = self.http.get(&path, &params).await?;
        Ok(response.data)
    }
}

#[async_trait]
impl RuleBackend for SentryClient {
    async fn list_projects(&self) -> Result<Vec<String>> {
        if let Some(project) = &self.project_slug {
            return Ok(vec![project.clone()]);
        }
        let path = format!("organizations/{}/projects/", self.org_slug);
        let projects: Vec<ProjectRecord> = self.http.get(&path, &[]).await?;
        Ok(projects.into_iter().map(|p| p.slug).collect())
    }

    async fn list_rules(&self, project: &str) -> Result<Vec<ExistingRule>> {
        let rules: Vec<RuleRecord> = self.http.get(&self.rules_path(project), &[]).await?;
        Ok(rules
            .into_iter()
            .map(|r| ExistingRule { id: r.id, name: r.name })
            .collect())
    }

    async fn create_rule(&self, project: &str, payload: &AlertRulePayload) -> Result<String> {
        let created: RuleRecord = self.http.post(&self.rules_path(project), payload).await?;
        Ok(created.id)
    }

    async fn update_rule(&self, project: &str, rule_id: &str, payload: &AlertRulePayload) -> Result<String> {
        let path = format!("{}{}/", self.rules_path(project), rule_id);
        let updated: RuleRecord = self.http.put(&path, payload).await?;
        Ok(updated.id)
    }
}
