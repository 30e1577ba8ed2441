//! Classification of the engine's mixed event stream.

use tracing::debug;

use crate::engine::EngineEvent;
use crate::stream::{ChatChunk, StreamItem};
use crate::translate::to_chunk;

/// Custom-event names that carry a fixed utterance.
const NARRATION_KINDS: [&str; 2] = ["narrate", "say"];
const FLUSH_KIND: &str = "flush";

/// What an engine event means to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Demuxed {
    /// Text from the model's token stream.
    Content(ChatChunk),
    /// Fixed utterance injected by a graph node.
    Narration(ChatChunk),
    /// Speech boundary.
    Flush,
    /// Nothing to deliver (non-text fragment, unknown custom event).
    Ignored,
}

/// Classifies one event.
pub fn classify(event: &EngineEvent) -> Demuxed {
    match event {
        EngineEvent::Message(fragment) => match to_chunk(fragment) {
            Some(chunk) => Demuxed::Content(chunk),
            None => Demuxed::Ignored,
        },
        EngineEvent::Custom(payload) => classify_custom(payload),
    }
}

fn classify_custom(payload: &serde_json::Value) -> Demuxed {
    let Some(kind) = payload.get("type").and_then(|v| v.as_str()) else {
        debug!("ignoring custom event without a type");
        return Demuxed::Ignored;
    };
    if kind == FLUSH_KIND {
        return Demuxed::Flush;
    }
    if NARRATION_KINDS.contains(&kind) {
        return match narration_text(payload).and_then(|text| ChatChunk::assistant(None, text)) {
            Some(chunk) => Demuxed::Narration(chunk),
            None => {
                debug!(kind, "ignoring narration without text");
                Demuxed::Ignored
            }
        };
    }
    debug!(kind, "ignoring unrecognized custom event");
    Demuxed::Ignored
}

/// Narration text lives at `data.content` or, in the flat form, at `text`.
fn narration_text(payload: &serde_json::Value) -> Option<&str> {
    payload
        .get("data")
        .and_then(|data| data.get("content"))
        .and_then(|v| v.as_str())
        .or_else(|| payload.get("text").and_then(|v| v.as_str()))
}

/// Turns classified events into queue items.
#[derive(Clone, Copy, Debug, Default)]
pub struct Demultiplexer {
    flush_after_narration: bool,
}

impl Demultiplexer {
    pub fn new(flush_after_narration: bool) -> Self {
        Self {
            flush_after_narration,
        }
    }

    /// Items for one event, in delivery order.
    pub fn items(&self, event: &EngineEvent) -> Vec<StreamItem> {
        match classify(event) {
            Demuxed::Content(chunk) => vec![StreamItem::Chunk(chunk)],
            Demuxed::Narration(chunk) if self.flush_after_narration => {
                vec![StreamItem::Chunk(chunk), StreamItem::Flush]
            }
            Demuxed::Narration(chunk) => vec![StreamItem::Chunk(chunk)],
            Demuxed::Flush => vec![StreamItem::Flush],
            Demuxed::Ignored => Vec::new(),
        }
    }
}
