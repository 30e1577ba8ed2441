//! Engine backend for a graph served over HTTP (threads/runs API with
//! server-sent-event streaming).

mod config;
mod transport;

use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::{debug, warn};

pub use config::RemoteGraphConfig;

use crate::cancel::CancelSignal;
use crate::engine::{EngineEvent, EngineEventStream, GraphEngine, GraphInput, StateSnapshot};
use crate::errors::{BridgeError, EngineError};
use crate::session::RunnableConfig;

use transport::{FrameOutcome, SseDecoder, map_frame};

const STREAM_MODES: [&str; 2] = ["messages-tuple", "custom"];

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// [`GraphEngine`] talking to a remote graph server.
#[derive(Clone)]
pub struct RemoteGraph {
    client: reqwest::Client,
    config: RemoteGraphConfig,
}

impl RemoteGraph {
    pub fn new(config: RemoteGraphConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build graph client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a backend from `LANGGRAPH_*` environment variables.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::new(RemoteGraphConfig::from_env()?)
    }

    pub fn config(&self) -> &RemoteGraphConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let req = self.client.request(method, url);
        match self.config.api_key.as_deref() {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }

    fn run_body(
        &self,
        input: &GraphInput,
        config: &RunnableConfig,
    ) -> Result<serde_json::Value, EngineError> {
        let config = serde_json::to_value(config)
            .map_err(|e| EngineError::Protocol(format!("failed to encode run config: {e}")))?;
        let mut body = serde_json::json!({
            "assistant_id": self.config.assistant_id,
            "config": config,
            "if_not_exists": "create",
        });
        if let Some(command) = input.command_value()? {
            body["command"] = command;
        } else if let Some(graph_input) = input.input_value()? {
            body["input"] = graph_input;
        }
        Ok(body)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, EngineError> {
        let response = req
            .send()
            .await
            .map_err(|e| EngineError::Transport(format!("graph request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl GraphEngine for RemoteGraph {
    fn name(&self) -> &str {
        "remote"
    }

    async fn invoke(
        &self,
        input: GraphInput,
        config: &RunnableConfig,
    ) -> Result<serde_json::Value, EngineError> {
        let thread_id = config.thread_id();
        let body = self.run_body(&input, config)?;
        debug!(thread_id, resume = input.is_resume(), "invoking remote graph");
        let req = self
            .request(reqwest::Method::POST, self.config.wait_url(thread_id))
            .timeout(self.config.timeout)
            .json(&body);
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|e| EngineError::Protocol(format!("invalid run output: {e}")))
    }

    async fn stream(
        &self,
        input: GraphInput,
        config: &RunnableConfig,
        cancel: CancelSignal,
    ) -> Result<EngineEventStream, EngineError> {
        let thread_id = config.thread_id().to_string();
        let mut body = self.run_body(&input, config)?;
        body["stream_mode"] = serde_json::json!(STREAM_MODES);
        debug!(thread_id = %thread_id, resume = input.is_resume(), "starting remote graph stream");

        let req = self
            .request(reqwest::Method::POST, self.config.stream_url(&thread_id))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        let mut cancel_wait = cancel.clone();
        let response = tokio::select! {
            biased;
            _ = cancel_wait.cancelled() => return Err(EngineError::Cancelled),
            response = self.send(req) => response?,
        };
        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(Box::pin(run_event_stream(
            self.clone(),
            thread_id,
            bytes_stream,
            cancel,
        )))
    }

    async fn get_state(&self, config: &RunnableConfig) -> Result<StateSnapshot, EngineError> {
        let req = self
            .request(reqwest::Method::GET, self.config.state_url(config.thread_id()))
            .timeout(self.config.timeout);
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|e| EngineError::Protocol(format!("invalid thread state: {e}")))
    }
}

fn run_event_stream(
    graph: RemoteGraph,
    thread_id: String,
    bytes_stream: ByteStream,
    cancel: CancelSignal,
) -> impl futures::Stream<Item = Result<EngineEvent, EngineError>> + Send {
    struct State {
        run: RemoteRun,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<EngineEvent>,
        failure: Option<EngineError>,
        cancel: CancelSignal,
    }

    stream::try_unfold(
        State {
            run: RemoteRun {
                graph,
                thread_id,
                run_id: None,
                finished: false,
            },
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            failure: None,
            cancel,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if let Some(failure) = state.failure.take() {
                    return Err(failure);
                }
                if state.run.finished {
                    return Ok(None);
                }

                let next = tokio::select! {
                    biased;
                    _ = state.cancel.cancelled() => None,
                    next = state.bytes_stream.next() => Some(next),
                };
                let Some(next) = next else {
                    return Err(EngineError::Cancelled);
                };
                match next {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            let outcome = match map_frame(&frame) {
                                Ok(outcome) => outcome,
                                Err(e) => {
                                    // Events decoded before the error still go out first.
                                    state.run.finished = true;
                                    state.failure = Some(e);
                                    break;
                                }
                            };
                            match outcome {
                                FrameOutcome::Events(events) => state.pending.extend(events),
                                FrameOutcome::RunStarted(run_id) => {
                                    debug!(thread_id = %state.run.thread_id, run_id = %run_id, "remote run started");
                                    state.run.run_id = Some(run_id);
                                }
                                FrameOutcome::End => {
                                    state.run.finished = true;
                                    break;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(EngineError::Transport(format!(
                            "graph stream read failed: {e}"
                        )));
                    }
                    None => state.run.finished = true,
                }
            }
        },
    )
}

/// Server-side run backing an event stream.
///
/// Dropping it before the run finished (consumer abort, cancel signal,
/// transport failure) asks the server to cancel the run.
struct RemoteRun {
    graph: RemoteGraph,
    thread_id: String,
    run_id: Option<String>,
    finished: bool,
}

impl Drop for RemoteRun {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(run_id) = self.run_id.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let req = self
            .graph
            .request(
                reqwest::Method::POST,
                self.graph.config.cancel_url(&self.thread_id, &run_id),
            )
            .timeout(self.graph.config.timeout);
        let graph = self.graph.clone();
        let thread_id = self.thread_id.clone();
        debug!(thread_id = %thread_id, run_id = %run_id, "cancelling remote run");
        runtime.spawn(async move {
            if let Err(e) = graph.send(req).await {
                warn!(thread_id = %thread_id, run_id = %run_id, error = %e, "failed to cancel remote run");
            }
        });
    }
}
