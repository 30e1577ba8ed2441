//! Chat-side and engine-side message representations.
//!
//! `ChatMessage` is what the voice pipeline owns; `EngineMessage` is the shape
//! the dialogue-graph engine accepts as input. Conversions live in
//! [`crate::translate`].

use serde::{Deserialize, Serialize};

/// Role of a chat message as the voice pipeline reports it.
///
/// Roles the bridge does not know deserialize to `Unknown` and are treated
/// as user input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
    Unknown,
}

impl From<&str> for ChatRole {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for ChatRole {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

/// Image reference inside structured chat content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub image: ImageSource,
}

/// Where an image's data lives. Only `Url` can cross into the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// URL or other string reference (including data URLs).
    Url(String),
    /// Raw decoded frame captured by the pipeline.
    Frame {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

/// Audio captured alongside a chat turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

/// One part of structured chat content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image(ImageContent),
    Audio(AudioContent),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image(ImageContent {
            id: None,
            image: ImageSource::Url(url.into()),
        })
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
        }
    }
}

/// Chat message content: plain text or an ordered list of parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<&str> for ChatContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ChatContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A message in the voice pipeline's chat history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: ChatRole,
    pub content: ChatContent,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<ChatContent>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<ChatContent>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<ChatContent>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn system(content: impl Into<ChatContent>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Role tag the engine uses for its messages (`type` on the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineRole {
    Human,
    Ai,
    System,
    Tool,
}

/// Structured engine content part.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnginePart {
    Text { text: String },
    ImageUrl { image_url: String },
}

/// Engine message content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EngineContent {
    Text(String),
    Parts(Vec<EnginePart>),
}

/// Message as the engine consumes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMessage {
    #[serde(rename = "type")]
    pub role: EngineRole,
    pub content: EngineContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl EngineMessage {
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            role: EngineRole::Ai,
            content: EngineContent::Text(text.into()),
            id: None,
        }
    }

    pub fn human(content: EngineContent) -> Self {
        Self {
            role: EngineRole::Human,
            content,
            id: None,
        }
    }
}

/// Incremental message fragment streamed by the engine in `messages` mode.
///
/// `content` stays untyped: model chunks carry a string, but tool-call chunks
/// and multimodal output carry lists or nothing at all.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFragment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl MessageFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            content: serde_json::Value::String(text.into()),
            kind: Some("AIMessageChunk".into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
