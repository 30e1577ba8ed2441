use crate::errors::RunFailure;
use crate::message::ChatRole;

/// Incremental assistant text.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChoiceDelta {
    pub role: ChatRole,
    pub content: String,
}

/// Unit of generated text delivered to the voice pipeline. `content` is never
/// empty.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatChunk {
    pub request_id: String,
    pub delta: ChoiceDelta,
}

impl ChatChunk {
    /// Builds an assistant chunk, or `None` when `content` is empty.
    pub fn assistant(request_id: Option<String>, content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            request_id: request_id.unwrap_or_else(short_id),
            delta: ChoiceDelta {
                role: ChatRole::Assistant,
                content,
            },
        })
    }

    pub fn content(&self) -> &str {
        &self.delta.content
    }
}

/// Items observed by the consumer, in the order the producer pushed them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamItem {
    /// First item of every run; carries no choices.
    Placeholder { request_id: String },
    /// Generated text.
    Chunk(ChatChunk),
    /// Tells the consumer to finalize whatever speech it has buffered.
    Flush,
}

impl StreamItem {
    /// Text carried by the item, if it is a chunk.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Chunk(chunk) => Some(chunk.content()),
            Self::Placeholder { .. } | Self::Flush => None,
        }
    }
}

/// One entry on the output queue: an item, or the terminal failure.
pub type StreamResult = Result<StreamItem, RunFailure>;

/// Contract the voice pipeline consumes generated text through.
#[async_trait::async_trait]
pub trait TextGenerationStream: Send {
    /// Next item in push order, or `None` once the stream is closed.
    async fn next_chunk(&mut self) -> Option<StreamResult>;

    /// Stops the run (if still active) and waits for the stream to end.
    async fn close(&mut self);

    /// Requests cancellation of the in-flight engine invocation.
    fn abort(&self);
}

/// Short random id used for chunks the engine did not assign one to.
pub(crate) fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_never_becomes_a_chunk() {
        assert!(ChatChunk::assistant(None, "").is_none());
    }

    #[test]
    fn chunk_keeps_request_id_or_generates_one() {
        let chunk = ChatChunk::assistant(Some("run-1".into()), "hi").expect("chunk");
        assert_eq!(chunk.request_id, "run-1");
        assert_eq!(chunk.delta.role, ChatRole::Assistant);

        let generated = ChatChunk::assistant(None, "hi").expect("chunk");
        assert_eq!(generated.request_id.len(), 12);
    }
}
