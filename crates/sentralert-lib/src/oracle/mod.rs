//! Language-model judgment oracle
//!
//! This module provides:
//! - The [`JudgmentOracle`] seam used by the latency detector
//! - The [`ToolCallingModel`] seam used by the service analysis agent
//! - Shared JSON extraction for model answers
//! - An Anthropic Messages API client implementing both

mod anthropic;
mod conversation;
mod extract;

use async_trait::async_trait;

use crate::error::Result;

pub use anthropic::AnthropicClient;
pub(crate) use anthropic::with_trailing_slash;
pub use conversation::{ContentBlock, Message, ModelTurn, Role, StopReason, ToolDefinition};
pub use extract::{extract_json, JsonExtraction};

/// Sampling temperature used for judgment calls
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Reviews a natural-language analysis prompt and answers in free text
#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    async fn analyze(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// Model that can request tool invocations during a conversation
#[async_trait]
pub trait ToolCallingModel: Send + Sync {
    /// Send the conversation so far and receive the next assistant turn
    async fn converse(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<ModelTurn>;

    /// Model identifier, for reporting
    fn model_name(&self) -> &str;
}
