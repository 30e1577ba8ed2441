//! Message translation between the voice pipeline and the engine.

use tracing::warn;

use crate::errors::UnsupportedContentError;
use crate::message::{
    ChatContent, ChatMessage, ChatRole, ContentPart, EngineContent, EngineMessage, EnginePart,
    EngineRole, ImageSource, MessageFragment,
};
use crate::stream::ChatChunk;

/// Fixed role table; anything unmapped is user input.
pub fn engine_role(role: &ChatRole) -> EngineRole {
    match role {
        ChatRole::User => EngineRole::Human,
        ChatRole::Assistant => EngineRole::Ai,
        ChatRole::System => EngineRole::System,
        ChatRole::Tool => EngineRole::Tool,
        ChatRole::Unknown => EngineRole::Human,
    }
}

pub fn chat_role(role: EngineRole) -> ChatRole {
    match role {
        EngineRole::Human => ChatRole::User,
        EngineRole::Ai => ChatRole::Assistant,
        EngineRole::System => ChatRole::System,
        EngineRole::Tool => ChatRole::Tool,
    }
}

/// Translates one chat message. Image parts must carry a string reference;
/// any other part kind is rejected rather than dropped.
pub fn to_engine_message(msg: &ChatMessage) -> Result<EngineMessage, UnsupportedContentError> {
    let content = match &msg.content {
        ChatContent::Text(text) => EngineContent::Text(text.clone()),
        ChatContent::Parts(parts) => EngineContent::Parts(
            parts
                .iter()
                .map(to_engine_part)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(EngineMessage {
        role: engine_role(&msg.role),
        content,
        id: msg.id.clone(),
    })
}

fn to_engine_part(part: &ContentPart) -> Result<EnginePart, UnsupportedContentError> {
    match part {
        ContentPart::Text { text } => Ok(EnginePart::Text { text: text.clone() }),
        ContentPart::Image(image) => match &image.image {
            ImageSource::Url(url) => Ok(EnginePart::ImageUrl {
                image_url: url.clone(),
            }),
            ImageSource::Frame { width, height, .. } => {
                warn!(width, height, "rejecting raw image frame");
                Err(UnsupportedContentError::ImageSource {
                    found: format!("raw frame {width}x{height}"),
                })
            }
        },
        other => {
            warn!(kind = other.kind(), "rejecting unsupported content part");
            Err(UnsupportedContentError::PartKind {
                kind: other.kind().to_string(),
            })
        }
    }
}

/// Translates a whole history, failing on the first unsupported part.
pub fn translate_history(
    history: &[ChatMessage],
) -> Result<Vec<EngineMessage>, UnsupportedContentError> {
    history.iter().map(to_engine_message).collect()
}

/// Inverse of [`to_engine_message`].
pub fn from_engine_message(msg: &EngineMessage) -> ChatMessage {
    let content = match &msg.content {
        EngineContent::Text(text) => ChatContent::Text(text.clone()),
        EngineContent::Parts(parts) => ChatContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    EnginePart::Text { text } => ContentPart::text(text.clone()),
                    EnginePart::ImageUrl { image_url } => ContentPart::image_url(image_url.clone()),
                })
                .collect(),
        ),
    };
    ChatMessage {
        id: msg.id.clone(),
        role: chat_role(msg.role),
        content,
    }
}

/// Converts a streamed fragment into a chunk. Returns `None` for fragments
/// without textual content (tool-call deltas, empty keep-alives, lists).
pub fn to_chunk(fragment: &MessageFragment) -> Option<ChatChunk> {
    let text = fragment.content.as_str()?;
    ChatChunk::assistant(fragment.id.clone(), text)
}
