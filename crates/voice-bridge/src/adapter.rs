use std::sync::Arc;

use tracing::debug;

use crate::cancel::cancel_pair;
use crate::config::BridgeConfig;
use crate::engine::GraphEngine;
use crate::errors::BridgeError;
use crate::interrupt::resolve_pending_interrupt;
use crate::message::ChatMessage;
use crate::queue::output_queue;
use crate::run::{BridgeStream, RunContext, StreamState, build_input, spawn_run};
use crate::session::{RunnableConfig, thread_id_for};
use crate::stream::{StreamItem, short_id};
use crate::translate::translate_history;

/// Presents a dialogue-graph engine to a voice pipeline as a text-generation
/// stream.
///
/// One adapter serves one conversation thread; each [`GraphAdapter::chat`]
/// call starts an independent run against that thread.
#[derive(Clone)]
pub struct GraphAdapter {
    engine: Arc<dyn GraphEngine>,
    config: Arc<BridgeConfig>,
    runnable: RunnableConfig,
}

impl GraphAdapter {
    /// Starts a builder around an engine backend.
    pub fn builder(engine: Arc<dyn GraphEngine>) -> GraphAdapterBuilder {
        GraphAdapterBuilder {
            engine,
            config: BridgeConfig::default(),
            thread_id: None,
            session_sid: None,
            configurable: serde_json::Map::new(),
        }
    }

    pub fn thread_id(&self) -> &str {
        self.runnable.thread_id()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Starts a streaming run for the given chat history.
    ///
    /// The placeholder item is queued before this returns. Must be called
    /// from within a Tokio runtime.
    pub fn chat(&self, history: Vec<ChatMessage>) -> BridgeStream {
        let request_id = short_id();
        let (queue, reader) = output_queue();
        let state = Arc::new(StreamState::new(self.thread_id().to_string(), queue));
        state.emit(Ok(StreamItem::Placeholder {
            request_id: request_id.clone(),
        }));
        let (abort_handle, cancel) = cancel_pair(state.clone());
        debug!(thread_id = %self.thread_id(), request_id = %request_id, messages = history.len(), "starting bridge run");
        spawn_run(
            RunContext {
                engine: self.engine.clone(),
                config: self.config.clone(),
                runnable: self.runnable.clone(),
                history,
                state,
                cancel,
            },
            request_id,
            reader,
            abort_handle,
        )
    }

    /// Runs the graph to completion without streaming and returns its output.
    ///
    /// Input selection matches [`GraphAdapter::chat`], including resuming a
    /// pending interrupt.
    pub async fn invoke(&self, history: &[ChatMessage]) -> Result<serde_json::Value, BridgeError> {
        let translated = translate_history(history)?;
        let pending = resolve_pending_interrupt(self.engine.as_ref(), &self.runnable).await;
        let input = build_input(&self.config, history, translated, pending.as_ref());
        Ok(self.engine.invoke(input, &self.runnable).await?)
    }
}

/// Builder for [`GraphAdapter`].
pub struct GraphAdapterBuilder {
    engine: Arc<dyn GraphEngine>,
    config: BridgeConfig,
    thread_id: Option<String>,
    session_sid: Option<String>,
    configurable: serde_json::Map<String, serde_json::Value>,
}

impl GraphAdapterBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an explicit engine thread id.
    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Derives the thread id from a room/participant session id.
    ///
    /// Ignored when an explicit thread id is set.
    pub fn session_sid(mut self, sid: impl Into<String>) -> Self {
        self.session_sid = Some(sid.into());
        self
    }

    /// Adds an extra entry to the engine's `configurable` map.
    pub fn configurable(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.configurable.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Result<GraphAdapter, BridgeError> {
        self.config.validate()?;
        let thread_id = match self.thread_id {
            Some(id) if id.trim().is_empty() => {
                return Err(BridgeError::Validation("thread_id must not be empty".into()));
            }
            Some(id) => id,
            None => thread_id_for(self.session_sid.as_deref()),
        };
        if self.configurable.contains_key("thread_id") {
            return Err(BridgeError::Config(
                "thread_id is set through thread_id()/session_sid(), not configurable()".into(),
            ));
        }
        let runnable = self
            .configurable
            .into_iter()
            .fold(RunnableConfig::for_thread(thread_id), |runnable, (key, value)| {
                runnable.with_configurable(key, value)
            });
        Ok(GraphAdapter {
            engine: self.engine,
            config: Arc::new(self.config),
            runnable,
        })
    }
}
