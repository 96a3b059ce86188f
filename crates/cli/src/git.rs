//! Git automation for `--auto`
//!
//! Branch, commit and push the freshly written alert files so they can go
//! through review as a pull request.

use anyhow::Result;
use sentralert_lib::oracle::{JudgmentOracle, DEFAULT_TEMPERATURE};
use sentralert_lib::persistence::slug;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::output::{print_info, print_success};

pub const BRANCH_PREFIX: &str = "alerts/";
pub const MAX_BRANCH_LEN: usize = 50;

/// Names listed in the branch prompt before summarizing the rest
const PROMPT_NAME_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run `git {command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {command}` failed: {stderr}")]
    Failed { command: String, stderr: String },
}

/// Prompt asking the oracle for a branch name
pub fn branch_prompt(names: &[String]) -> String {
    let mut summary = names
        .iter()
        .take(PROMPT_NAME_LIMIT)
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    if names.len() > PROMPT_NAME_LIMIT {
        summary.push_str(&format!("\n- ... and {} more", names.len() - PROMPT_NAME_LIMIT));
    }

    format!(
        "Generate a concise git branch name for this set of alert configurations:\n\n\
         {summary}\n\n\
         Requirements:\n\
         - Use kebab-case (lowercase with hyphens)\n\
         - Start with \"alerts/\" prefix\n\
         - Be descriptive but concise (max 50 chars)\n\
         - Include the type of alerts or main focus\n\n\
         Examples:\n\
         - alerts/checkout-monitoring\n\
         - alerts/payment-failure-detection\n\
         - alerts/api-latency-alerts\n\n\
         Respond with ONLY the branch name, nothing else."
    )
}

/// Force an oracle answer into a usable branch name
///
/// Keeps the first line, lowercases, maps anything outside `[a-z0-9-]`
/// to `-`, adds the `alerts/` prefix and caps the length.
pub fn sanitize_branch_name(raw: &str) -> String {
    let line = raw
        .lines()
        .map(|l| l.trim().trim_matches(|c| c == '`' || c == '"' || c == '\''))
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_lowercase();
    let body = line.strip_prefix(BRANCH_PREFIX).unwrap_or(&line);

    let mut kebab = String::with_capacity(body.len());
    for c in body.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '-' };
        if c == '-' && (kebab.is_empty() || kebab.ends_with('-')) {
            continue;
        }
        kebab.push(c);
    }

    let mut name = format!("{BRANCH_PREFIX}{}", kebab.trim_end_matches('-'));
    name.truncate(MAX_BRANCH_LEN);
    let name = name.trim_end_matches('-');
    if name.len() == BRANCH_PREFIX.len() {
        format!("{BRANCH_PREFIX}new-alerts")
    } else {
        name.to_string()
    }
}

/// Commit message listing every proposed alert
pub fn commit_message(names: &[String]) -> String {
    let list = names
        .iter()
        .map(|name| format!("  - {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Add {} alert configuration(s)\n\nAlert configurations proposed:\n{list}\n",
        names.len()
    )
}

/// Git operations rooted at one working directory
pub struct GitWorkflow {
    repo_dir: PathBuf,
}

impl GitWorkflow {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> std::result::Result<String, GitError> {
        let command = args.join(" ");
        debug!(command = %command, "Running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::Failed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Initialize a repository unless one already contains `repo_dir`
    pub async fn ensure_repository(&self) -> std::result::Result<bool, GitError> {
        if self.git(&["rev-parse", "--git-dir"]).await.is_ok() {
            return Ok(false);
        }
        print_info("Not a git repository. Initializing git...");
        self.git(&["init"]).await?;
        print_success("Git repository initialized");
        Ok(true)
    }

    /// Branch name from the oracle, or from the first alert name if it fails
    pub async fn branch_name(&self, oracle: &dyn JudgmentOracle, names: &[String]) -> String {
        match oracle.analyze(&branch_prompt(names), DEFAULT_TEMPERATURE).await {
            Ok(answer) => sanitize_branch_name(&answer),
            Err(e) => {
                warn!(error = %e, "Branch name generation failed, deriving one locally");
                sanitize_branch_name(&slug(names.first().map(String::as_str).unwrap_or_default()))
            }
        }
    }

    /// Create a branch, commit `output_dir` and push it to `origin`
    pub async fn run(&self, oracle: &dyn JudgmentOracle, names: &[String], output_dir: &Path) -> Result<String> {
        self.ensure_repository().await?;

        let branch = self.branch_name(oracle, names).await;
        print_success(&format!("Generated branch name: {branch}"));

        print_info(&format!("Creating branch: {branch}"));
        self.git(&["checkout", "-b", &branch]).await?;

        print_info("Adding alert files...");
        let dir = output_dir.to_string_lossy();
        self.git(&["add", dir.as_ref()]).await?;

        print_info("Creating commit...");
        self.git(&["commit", "-m", &commit_message(names)]).await?;
        print_success("Commit created");

        print_info(&format!("Pushing branch: {branch}"));
        self.git(&["push", "-u", "origin", &branch]).await?;
        print_success("Branch pushed successfully");

        Ok(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Alert {i}")).collect()
    }

    #[test]
    fn test_sanitize_branch_name() {
        assert_eq!(sanitize_branch_name("alerts/checkout-monitoring\n"), "alerts/checkout-monitoring");
        assert_eq!(sanitize_branch_name("`Alerts/Checkout Latency!`"), "alerts/checkout-latency");
        assert_eq!(sanitize_branch_name("payment_failure detection"), "alerts/payment-failure-detection");
        assert_eq!(sanitize_branch_name("   \n"), "alerts/new-alerts");

        let long = sanitize_branch_name(&"very-long-segment-".repeat(10));
        assert!(long.len() <= MAX_BRANCH_LEN);
        assert!(long.starts_with(BRANCH_PREFIX));
        assert!(!long.ends_with('-'));
    }

    #[test]
    fn test_branch_prompt_lists_first_five() {
        let prompt = branch_prompt(&names(7));
        assert!(prompt.contains("- Alert 5\n- ... and 2 more"));
        assert!(!prompt.contains("Alert 6"));

        let short = branch_prompt(&names(2));
        assert!(!short.contains("more"));
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message(&names(2)),
            "Add 2 alert configuration(s)\n\nAlert configurations proposed:\n  - Alert 1\n  - Alert 2\n"
        );
    }
}
