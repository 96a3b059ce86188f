//! Configuration loaded from the process environment
//!
//! Everything the engine needs is resolved once into [`AppConfig`] and then
//! handed to constructors; nothing below this module reads the environment.

use serde::Deserialize;

use crate::error::{AlertError, Result};

pub const SENTRY_AUTH_TOKEN: &str = "SENTRY_AUTH_TOKEN";
pub const SENTRY_ORG_SLUG: &str = "SENTRY_ORG_SLUG";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Variables required by the analysis flows
pub const ANALYSIS_REQUIRED: &[&str] = &[SENTRY_AUTH_TOKEN, SENTRY_ORG_SLUG, ANTHROPIC_API_KEY];

/// Variables required to apply alerts to the backend
pub const BACKEND_REQUIRED: &[&str] = &[SENTRY_AUTH_TOKEN, SENTRY_ORG_SLUG];

/// Raw application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Sentry API bearer token
    pub sentry_auth_token: Option<String>,
    /// Sentry organization slug
    pub sentry_org_slug: Option<String>,
    /// Project that receives applied alerts (first project when unset)
    pub sentry_project_slug: Option<String>,
    /// Sentry API base URL
    #[serde(default = "default_sentry_api")]
    pub sentry_api: String,

    /// Anthropic API key for the judgment oracle
    pub anthropic_api_key: Option<String>,
    #[serde(default = "default_anthropic_api_url")]
    pub anthropic_api_url: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    /// Default notification target for proposed alerts
    #[serde(default = "default_notify_email")]
    pub alerts_notify_email: String,

    #[serde(default = "default_deepwiki_repo_url")]
    pub deepwiki_repo_url: String,
    #[serde(default = "default_deepwiki_mcp_url")]
    pub deepwiki_mcp_url: String,
}

fn default_sentry_api() -> String {
    "https://sentry.io/api/0".to_string()
}

fn default_anthropic_api_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

fn default_notify_email() -> String {
    "team@example.com".to_string()
}

fn default_deepwiki_repo_url() -> String {
    "https://deepwiki.com/wuTims/sentralert-demo-service".to_string()
}

fn default_deepwiki_mcp_url() -> String {
    "https://mcp.deepwiki.com/mcp".to_string()
}

/// Connection settings for the Sentry API
#[derive(Debug, Clone)]
pub struct SentrySettings {
    pub api_url: String,
    pub auth_token: String,
    pub org_slug: String,
    pub project_slug: Option<String>,
}

/// Connection settings for the language-model oracle
#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

/// Values stamped onto every generated suggestion
#[derive(Debug, Clone)]
pub struct AlertDefaults {
    pub notify_email: String,
}

impl Default for AlertDefaults {
    fn default() -> Self {
        Self {
            notify_email: default_notify_email(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    /// Load configuration from an explicit variable map
    pub fn from_map<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_environment(config::Environment::default().source(Some(map)))
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder().add_source(env).build()?;
        let mut app: AppConfig = config.try_deserialize()?;
        app.normalize();
        Ok(app)
    }

    /// Blank values count as unset
    fn normalize(&mut self) {
        for field in [
            &mut self.sentry_auth_token,
            &mut self.sentry_org_slug,
            &mut self.sentry_project_slug,
            &mut self.anthropic_api_key,
        ] {
            if field.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *field = None;
            }
        }
    }

    fn value_of(&self, key: &str) -> Option<&str> {
        match key {
            SENTRY_AUTH_TOKEN => self.sentry_auth_token.as_deref(),
            SENTRY_ORG_SLUG => self.sentry_org_slug.as_deref(),
            ANTHROPIC_API_KEY => self.anthropic_api_key.as_deref(),
            _ => None,
        }
    }

    /// Names of the required variables that are not set
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|key| self.value_of(key).is_none())
            .map(|key| key.to_string())
            .collect()
    }

    /// Fail with every missing variable at once
    pub fn require(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AlertError::Configuration { missing })
        }
    }

    pub fn sentry_settings(&self) -> Result<SentrySettings> {
        self.require(BACKEND_REQUIRED)?;
        Ok(SentrySettings {
            api_url: self.sentry_api.clone(),
            auth_token: self.sentry_auth_token.clone().unwrap_or_default(),
            org_slug: self.sentry_org_slug.clone().unwrap_or_default(),
            project_slug: self.sentry_project_slug.clone(),
        })
    }

    pub fn oracle_settings(&self) -> Result<OracleSettings> {
        self.require(&[ANTHROPIC_API_KEY])?;
        Ok(OracleSettings {
            api_url: self.anthropic_api_url.clone(),
            api_key: self.anthropic_api_key.clone().unwrap_or_default(),
            model: self.anthropic_model.clone(),
        })
    }

    pub fn alert_defaults(&self) -> AlertDefaults {
        AlertDefaults {
            notify_email: self.alerts_notify_email.clone(),
        }
    }
}
