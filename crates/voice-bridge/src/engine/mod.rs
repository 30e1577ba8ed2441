//! Dialogue-graph engine capability consumed by the bridge.
//!
//! Backends implement [`GraphEngine`]; the adapter never knows whether the
//! graph runs in-process or behind an HTTP server.

pub mod remote;

use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelSignal;
use crate::errors::EngineError;
use crate::message::{EngineContent, EngineMessage, MessageFragment};
use crate::session::RunnableConfig;

/// One event of an engine execution, tagged by stream mode.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// `messages` mode: an incremental message fragment.
    Message(MessageFragment),
    /// `custom` mode: an arbitrary payload written by a graph node.
    Custom(serde_json::Value),
}

/// Event stream returned by [`GraphEngine::stream`].
///
/// A suspension surfaces as a final `Err(EngineError::Suspended { .. })`.
pub type EngineEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<EngineEvent, EngineError>> + Send + 'static>>;

/// Interrupt recorded in engine execution state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterruptRecord {
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl InterruptRecord {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self {
            value: value.into(),
            id: None,
        }
    }
}

/// Pending task in a state snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub interrupts: Vec<InterruptRecord>,
}

/// Current execution state for a thread (only the parts the bridge reads).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub tasks: Vec<TaskState>,
}

/// Input that continues a suspended execution with the user's answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResumeCommand {
    pub content: EngineContent,
    pub messages: Vec<EngineMessage>,
}

impl ResumeCommand {
    /// `messages` is `[assistant: interrupt_value, user: answer]`, and
    /// `content` repeats the answer's content.
    pub fn new(interrupt_value: &str, answer: EngineMessage) -> Self {
        Self {
            content: answer.content.clone(),
            messages: vec![EngineMessage::ai(interrupt_value), answer],
        }
    }
}

/// What an engine run is started with.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphInput {
    /// Fresh input: the translated history keyed under the graph's input field.
    Messages {
        key: String,
        messages: Vec<EngineMessage>,
    },
    /// Continue a suspended execution.
    Resume(ResumeCommand),
}

impl GraphInput {
    /// JSON for the graph input object; `None` for resume commands.
    pub fn input_value(&self) -> Result<Option<serde_json::Value>, EngineError> {
        let Self::Messages { key, messages } = self else {
            return Ok(None);
        };
        let messages = serde_json::to_value(messages)
            .map_err(|e| EngineError::Protocol(format!("failed to encode graph input: {e}")))?;
        let mut map = serde_json::Map::new();
        map.insert(key.clone(), messages);
        Ok(Some(serde_json::Value::Object(map)))
    }

    /// JSON for the `command` object; `None` for fresh input.
    pub fn command_value(&self) -> Result<Option<serde_json::Value>, EngineError> {
        let Self::Resume(command) = self else {
            return Ok(None);
        };
        let resume = serde_json::to_value(command)
            .map_err(|e| EngineError::Protocol(format!("failed to encode resume command: {e}")))?;
        let mut map = serde_json::Map::new();
        map.insert("resume".to_string(), resume);
        Ok(Some(serde_json::Value::Object(map)))
    }

    pub fn is_resume(&self) -> bool {
        matches!(self, Self::Resume(_))
    }
}

/// Capabilities of a dialogue-graph engine backend.
#[async_trait::async_trait]
pub trait GraphEngine: Send + Sync {
    /// Short backend name for logs (for example `remote`).
    fn name(&self) -> &str;

    /// Runs to completion and returns the final graph output.
    async fn invoke(
        &self,
        input: GraphInput,
        config: &RunnableConfig,
    ) -> Result<serde_json::Value, EngineError>;

    /// Starts a streaming execution in `messages` + `custom` modes.
    ///
    /// Implementations must stop producing events once `cancel` fires.
    async fn stream(
        &self,
        input: GraphInput,
        config: &RunnableConfig,
        cancel: CancelSignal,
    ) -> Result<EngineEventStream, EngineError>;

    /// Reads the current execution state of the configured thread.
    async fn get_state(&self, config: &RunnableConfig) -> Result<StateSnapshot, EngineError>;
}
