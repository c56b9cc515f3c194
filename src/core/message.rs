use serde::{Deserialize, Serialize};

use crate::api::HistoryMessage;
use crate::core::chat_stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TranscriptRole {
    User,
    Assistant,
    /// Locally generated notice (rejected input, stream failure). Never sent.
    AppError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: TranscriptRole,
    #[serde(default)]
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Set when the stream that produced this message ended in an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Assistant => "assistant",
            TranscriptRole::AppError => "app/error",
        }
    }

    pub fn to_api_role(self) -> Option<&'static str> {
        match self {
            TranscriptRole::User => Some("user"),
            TranscriptRole::Assistant => Some("assistant"),
            TranscriptRole::AppError => None,
        }
    }
}

impl TryFrom<&str> for TranscriptRole {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(TranscriptRole::User),
            "assistant" => Ok(TranscriptRole::Assistant),
            "app/error" => Ok(TranscriptRole::AppError),
            _ => Err(format!("invalid transcript role: {value}")),
        }
    }
}

impl TryFrom<String> for TranscriptRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<TranscriptRole> for String {
    fn from(value: TranscriptRole) -> Self {
        value.as_str().to_string()
    }
}

impl Message {
    pub fn new(role: TranscriptRole, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            content: content.into(),
            image_url: None,
            error: None,
        }
    }

    pub fn user(kind: MessageKind, content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::User, kind, content)
    }

    /// An empty assistant message that stream deltas are appended to.
    pub fn assistant_pending() -> Self {
        Self::new(TranscriptRole::Assistant, MessageKind::Text, String::new())
    }

    pub fn assistant_image(image_url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
            ..Self::new(TranscriptRole::Assistant, MessageKind::Image, caption)
        }
    }

    pub fn app_error(content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::AppError, MessageKind::Text, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == TranscriptRole::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == TranscriptRole::Assistant
    }

    /// Fold one stream event into this message. Content is appended in
    /// arrival order; an error is recorded alongside whatever arrived before
    /// it. Returns true once the stream is over.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Content(delta) => {
                self.content.push_str(delta);
                false
            }
            StreamEvent::Done => true,
            StreamEvent::Error(message) => {
                self.error = Some(message.clone());
                true
            }
        }
    }

    /// This message as conversation context for the next request. App
    /// notices and image results are not part of the model's history.
    pub fn to_history(&self) -> Option<HistoryMessage> {
        if self.kind == MessageKind::Image && self.is_assistant() {
            return None;
        }
        let role = self.role.to_api_role()?;
        Some(HistoryMessage {
            role: role.to_string(),
            content: self.content.clone(),
        })
    }
}

pub fn history_from_transcript<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
) -> Vec<HistoryMessage> {
    messages.into_iter().filter_map(Message::to_history).collect()
}
