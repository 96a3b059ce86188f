//! DeepWiki MCP client
//!
//! Speaks the streamable-HTTP flavour of the Model Context Protocol: JSON-RPC
//! 2.0 requests POSTed to a single endpoint, answered either with a JSON body
//! or a short `text/event-stream`.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{AlertError, Result};

const JSONRPC_VERSION: &str = "2.0";
const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_TYPES: &str = "application/json, text/event-stream";
const DEEPWIKI_SITE: &str = "https://deepwiki.com/";
const ASK_QUESTION_TOOL: &str = "ask_question";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    /// Absent for notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `owner/repo` from a DeepWiki page URL; other values pass through
pub fn repo_from_url(repo_url: &str) -> String {
    repo_url
        .strip_prefix(DEEPWIKI_SITE)
        .unwrap_or(repo_url)
        .trim_matches('/')
        .to_string()
}

/// Asks questions about one repository indexed by DeepWiki
pub struct DeepWikiClient {
    client: Client,
    endpoint: Url,
    repo: String,
}

impl DeepWikiClient {
    pub fn new(mcp_url: &str, repo_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AlertError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;
        let endpoint = Url::parse(mcp_url)
            .map_err(|e| AlertError::InvalidConfig(format!("invalid DeepWiki MCP URL: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            repo: repo_from_url(repo_url),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Open a session and call the `ask_question` tool
    pub async fn ask_question(&self, question: &str) -> Result<String> {
        let init = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method: "initialize",
            params: Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "sentralert", "version": env!("CARGO_PKG_VERSION")},
            })),
            id: Some(1),
        };
        let (_, session) = self.call(&init, None).await?;

        let initialized = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method: "notifications/initialized",
            params: None,
            id: None,
        };
        self.post(&initialized, session.as_deref()).await?;

        let ask = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method: "tools/call",
            params: Some(json!({
                "name": ASK_QUESTION_TOOL,
                "arguments": {"repoName": self.repo, "question": question},
            })),
            id: Some(2),
        };
        let (result, _) = self.call(&ask, session.as_deref()).await?;
        tool_text(&result).ok_or_else(|| AlertError::Rpc {
            endpoint: self.endpoint.to_string(),
            code: 0,
            message: "tool call returned no text content".to_string(),
        })
    }

    async fn post(&self, request: &JsonRpcRequest<'_>, session: Option<&str>) -> Result<reqwest::Response> {
        debug!(method = request.method, "Calling DeepWiki MCP");
        let endpoint = self.endpoint.to_string();

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, ACCEPT_TYPES)
            .json(request);
        if let Some(session) = session {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder
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
        Ok(response)
    }

    /// Send a request and return its result plus the session id, if any
    async fn call(&self, request: &JsonRpcRequest<'_>, session: Option<&str>) -> Result<(Value, Option<String>)> {
        let endpoint = self.endpoint.to_string();
        let response = self.post(request, session).await?;

        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| session.map(str::to_string));
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|source| AlertError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        let parsed = if is_stream {
            last_event(&body)
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body).ok()
        };
        let parsed = parsed.ok_or_else(|| AlertError::Rpc {
            endpoint: endpoint.clone(),
            code: 0,
            message: "response carried no JSON-RPC message".to_string(),
        })?;

        if let Some(error) = parsed.error {
            return Err(AlertError::Rpc {
                endpoint,
                code: error.code,
                message: error.message,
            });
        }
        Ok((parsed.result.unwrap_or(Value::Null), session))
    }
}

/// Last JSON-RPC response carried by an event stream
fn last_event(body: &str) -> Option<JsonRpcResponse> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .filter(|msg| msg.result.is_some() || msg.error.is_some())
        .last()
}

/// Concatenated text content of a `tools/call` result
fn tool_text(result: &Value) -> Option<String> {
    let text: String = result
        .get("content")?
        .as_array()?
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}
