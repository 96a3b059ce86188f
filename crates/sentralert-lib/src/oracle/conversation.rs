//! Conversation types shared by tool-calling models

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block kinds this client does not act on
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// Tool advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    Other(String),
}

impl From<Option<&str>> for StopReason {
    fn from(reason: Option<&str>) -> Self {
        match reason {
            Some("end_turn") => Self::EndTurn,
            Some("tool_use") => Self::ToolUse,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other("unknown".to_string()),
        }
    }
}

/// Assistant turn returned by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl ModelTurn {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Requested tool invocations as (id, name, input)
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    /// Replay this turn as an assistant message; unsupported blocks are dropped
    pub fn into_message(self) -> Message {
        Message {
            role: Role::Assistant,
            content: self
                .content
                .into_iter()
                .filter(|block| *block != ContentBlock::Unsupported)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_blocks_roundtrip_wire_format() {
        let json = serde_json::json!([
            {"type": "text", "text": "Looking at the codebase"},
            {"type": "tool_use", "id": "tu_1", "name": "query_deepwiki_codebase", "input": {"query": "endpoints"}},
            {"type": "thinking", "thinking": "..."}
        ]);
        let blocks: Vec<ContentBlock> = serde_json::from_value(json).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], ContentBlock::Unsupported);

        let turn = ModelTurn {
            stop_reason: StopReason::ToolUse,
            content: blocks,
        };
        assert_eq!(turn.text(), "Looking at the codebase");
        let uses: Vec<_> = turn.tool_uses().collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "query_deepwiki_codebase");
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(StopReason::from(Some("end_turn")), StopReason::EndTurn);
        assert_eq!(StopReason::from(Some("tool_use")), StopReason::ToolUse);
        assert_eq!(
            StopReason::from(Some("max_tokens")),
            StopReason::Other("max_tokens".to_string())
        );
    }

    #[test]
    fn test_tool_result_serializes_with_type_tag() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "tu_1".to_string(),
            content: "{}".to_string(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "tu_1");
    }
}
