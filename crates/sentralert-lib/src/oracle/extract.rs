//! JSON extraction from free-form model output
//!
//! Model answers usually wrap the JSON object in a fenced code block, with
//! or without a `json` tag, sometimes with prose around it. Both analysis
//! flows go through [`extract_json`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AlertError, Result};

const TAGGED_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Outcome of pulling a JSON object out of model text
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtraction {
    /// A JSON object was found
    Object(Value),
    /// No JSON object could be recovered; the raw text is kept for reporting
    Unparsed { raw: String, error: String },
}

impl JsonExtraction {
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Convert into the object or a [`AlertError::MalformedOracleResponse`]
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Object(value) => Ok(value),
            Self::Unparsed { error, .. } => Err(AlertError::MalformedOracleResponse(error)),
        }
    }

    /// Deserialize the object into `T`; missing keys are malformed responses
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.into_value()?;
        serde_json::from_value(value).map_err(|e| AlertError::MalformedOracleResponse(e.to_string()))
    }
}

/// Locate and parse the JSON object embedded in `text`
///
/// Candidates, in order: the first ```` ```json ```` fence, the first bare
/// fence, the whole text, and finally the outermost `{...}` span.
pub fn extract_json(text: &str) -> JsonExtraction {
    let candidate = fenced_block(text).unwrap_or(text).trim();

    let first_error = match parse_object(candidate) {
        Ok(value) => return JsonExtraction::Object(value),
        Err(e) => e,
    };

    if let Some(span) = brace_span(text) {
        if let Ok(value) = parse_object(span) {
            return JsonExtraction::Object(value);
        }
    }

    JsonExtraction::Unparsed {
        raw: text.to_string(),
        error: first_error,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let (start, skip) = if let Some(idx) = text.find(TAGGED_FENCE) {
        (idx, TAGGED_FENCE.len())
    } else {
        (text.find(FENCE)?, FENCE.len())
    };
    let body = &text[start + skip..];
    let end = body.find(FENCE).unwrap_or(body.len());
    Some(&body[..end])
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_object(candidate: &str) -> std::result::Result<Value, String> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!("expected a JSON object, found {}", json_type(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
