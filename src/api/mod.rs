//! Payloads exchanged with the completion service's chat and image endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::constants::{DEFAULT_IMAGE_QUALITY, DEFAULT_IMAGE_SIZE};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// Body of a text request. `message` is already validated and trimmed.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: String,
    pub quality: String,
}

impl ImageRequest {
    pub fn new(prompt: String) -> Self {
        Self {
            prompt,
            size: DEFAULT_IMAGE_SIZE.to_string(),
            quality: DEFAULT_IMAGE_QUALITY.to_string(),
        }
    }
}

/// One newline-terminated line of a streamed text response.
///
/// A line carries `content`, `done: true`, or `error`. The error is usually a
/// string but some failure paths send `{"message": ...}` objects.
#[derive(Debug, Default, PartialEq)]
pub struct StreamLine {
    pub content: Option<String>,
    pub done: bool,
    pub error: Option<Value>,
}

impl StreamLine {
    /// Read the known fields of a decoded line one at a time, so a mistyped
    /// field never hides a well-formed one. `None` for non-objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            content: object
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_owned),
            done: object.get("done").and_then(Value::as_bool) == Some(true),
            error: object.get("error").filter(|error| !error.is_null()).cloned(),
        })
    }
}

/// Single-shot response from the image endpoint.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ImageResponse {
    #[serde(default)]
    pub image_url: Option<Value>,
    pub prompt: Option<String>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub revised_prompt: Option<String>,
    pub success: Option<bool>,
    pub error: Option<String>,
}
