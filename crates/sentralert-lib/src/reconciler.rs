//! Rule reconciliation against the alerting backend
//!
//! Rules are keyed by name: a suggestion whose name matches an existing rule
//! replaces that rule, anything else is created. Batch applies isolate
//! failures per file so one bad document never blocks the rest.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AlertError, Result};
use crate::models::{AlertRulePayload, AlertSuggestion, ExistingRule};
use crate::normalizer::build_payload;
use crate::observability::{apply, RunMetrics, StructuredLogger};
use crate::persistence::{StoredAlert, SuggestionStore};

/// Alert-rule storage on the backend
#[async_trait]
pub trait RuleBackend: Send + Sync {
    /// Project slugs available to the caller, preferred project first
    async fn list_projects(&self) -> Result<Vec<String>>;

    async fn list_rules(&self, project: &str) -> Result<Vec<ExistingRule>>;

    async fn create_rule(&self, project: &str, payload: &AlertRulePayload) -> Result<String>;

    /// Full replacement of an existing rule
    async fn update_rule(&self, project: &str, rule_id: &str, payload: &AlertRulePayload) -> Result<String>;
}

/// What to do with one suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    Create,
    Update { rule_id: String },
}

/// Decide create-vs-update by exact, case-sensitive name match
///
/// The first matching rule wins.
pub fn plan(existing: &[ExistingRule], name: &str) -> ReconcilePlan {
    existing
        .iter()
        .find(|rule| rule.name == name)
        .map(|rule| ReconcilePlan::Update {
            rule_id: rule.id.clone(),
        })
        .unwrap_or(ReconcilePlan::Create)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => apply::CREATED,
            Self::Updated => apply::UPDATED,
        }
    }
}

/// Rule written to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRule {
    pub name: String,
    pub project: String,
    pub rule_id: String,
    pub outcome: ApplyOutcome,
}

/// One file that could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub item: String,
    pub error: String,
}

/// Result of applying a directory of alert files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Alert files found
    pub files: usize,
    pub applied: Vec<AppliedRule>,
    /// Files skipped because they are not metric alerts
    pub skipped: Vec<String>,
    pub failures: Vec<ApplyFailure>,
}

impl BatchReport {
    /// Suggestions successfully created or updated
    pub fn succeeded(&self) -> usize {
        self.applied.len()
    }
}

/// Applies suggestions to a [`RuleBackend`]
pub struct Reconciler {
    backend: Arc<dyn RuleBackend>,
    logger: StructuredLogger,
    metrics: RunMetrics,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn RuleBackend>) -> Self {
        Self {
            backend,
            logger: StructuredLogger::for_new_run(),
            metrics: RunMetrics::new(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Project receiving applied rules: the first one the backend offers
    pub async fn resolve_project(&self) -> Result<String> {
        self.backend
            .list_projects()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AlertError::InvalidConfig("no projects found in organization".to_string()))
    }

    /// Plan for `name` against the project's current rules
    pub async fn plan_for(&self, project: &str, name: &str) -> Result<ReconcilePlan> {
        let existing = self.backend.list_rules(project).await?;
        Ok(plan(&existing, name))
    }

    /// Create or update the rule for one suggestion
    pub async fn apply(&self, suggestion: &AlertSuggestion) -> Result<AppliedRule> {
        self.apply_inner(suggestion)
            .await
            .map_err(|e| AlertError::Reconciliation {
                name: suggestion.name.clone(),
                reason: e.to_string(),
            })
    }

    async fn apply_inner(&self, suggestion: &AlertSuggestion) -> Result<AppliedRule> {
        let project = self.resolve_project().await?;
        let payload = build_payload(suggestion, &project);

        let (rule_id, outcome) = match self.plan_for(&project, &suggestion.name).await? {
            ReconcilePlan::Update { rule_id } => (
                self.backend.update_rule(&project, &rule_id, &payload).await?,
                ApplyOutcome::Updated,
            ),
            ReconcilePlan::Create => (
                self.backend.create_rule(&project, &payload).await?,
                ApplyOutcome::Created,
            ),
        };

        self.metrics.inc_rule_applied(outcome.as_str());
        self.logger
            .log_rule_applied(&suggestion.name, &project, outcome.as_str(), &rule_id);
        Ok(AppliedRule {
            name: suggestion.name.clone(),
            project,
            rule_id,
            outcome,
        })
    }

    /// Apply every alert file in `store`, in sorted order
    ///
    /// Parse and submission failures are recorded per file and the batch
    /// continues. Only a directory that cannot be listed fails the call.
    pub async fn apply_directory(&self, store: &SuggestionStore) -> Result<BatchReport> {
        let files = store.alert_files()?;
        let mut report = BatchReport {
            files: files.len(),
            ..BatchReport::default()
        };

        for path in files {
            let item = file_label(&path);
            match self.apply_file(&path).await {
                Ok(Some(applied)) => report.applied.push(applied),
                Ok(None) => {
                    self.metrics.inc_rule_applied(apply::SKIPPED);
                    report.skipped.push(item);
                }
                Err(e) => {
                    self.metrics.inc_rule_applied(apply::FAILED);
                    self.logger.log_apply_failure(&item, &e.to_string());
                    report.failures.push(ApplyFailure {
                        item,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn apply_file(&self, path: &Path) -> Result<Option<AppliedRule>> {
        match SuggestionStore::load(path)? {
            StoredAlert::MetricAlert(suggestion) => self.apply(&suggestion).await.map(Some),
            StoredAlert::OtherKind(_) => Ok(None),
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
