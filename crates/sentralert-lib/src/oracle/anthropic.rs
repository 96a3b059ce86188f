//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{
    ContentBlock, JudgmentOracle, Message, ModelTurn, StopReason, ToolCallingModel, ToolDefinition,
};
use crate::config::OracleSettings;
use crate::error::{AlertError, Result};

const API_VERSION: &str = "2023-06-01";
const MESSAGES_PATH: &str = "v1/messages";
const ANALYZE_MAX_TOKENS: u32 = 2000;
const CONVERSE_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

/// Client for the Anthropic Messages API
pub struct AnthropicClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(settings: &OracleSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AlertError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        let base = Url::parse(&with_trailing_slash(&settings.api_url))
            .map_err(|e| AlertError::InvalidConfig(format!("invalid Anthropic API URL: {e}")))?;
        let endpoint = base
            .join(MESSAGES_PATH)
            .map_err(|e| AlertError::InvalidConfig(format!("invalid Anthropic API URL: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse> {
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling Anthropic Messages API"
        );

        let endpoint = self.endpoint.to_string();
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|source| AlertError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Request {
                endpoint,
                status,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| AlertError::Transport { endpoint, source })
    }
}

#[async_trait]
impl JudgmentOracle for AnthropicClient {
    async fn analyze(&self, prompt: &str, temperature: f32) -> Result<String> {
        let messages = [Message::user_text(prompt)];
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: ANALYZE_MAX_TOKENS,
            temperature: Some(temperature),
            messages: &messages,
            tools: &[],
        };

        let response = self.send(&request).await?;
        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .ok_or_else(|| AlertError::MalformedOracleResponse("response had no text block".to_string()))
    }
}

#[async_trait]
impl ToolCallingModel for AnthropicClient {
    async fn converse(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<ModelTurn> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: CONVERSE_MAX_TOKENS,
            temperature: None,
            messages,
            tools,
        };

        let response = self.send(&request).await?;
        Ok(ModelTurn {
            stop_reason: StopReason::from(response.stop_reason.as_deref()),
            content: response.content,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

pub(crate) fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
