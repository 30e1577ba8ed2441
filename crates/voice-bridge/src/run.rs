use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::{Stream, StreamExt as _};
use tokio::task::JoinHandle;
use tracing::{Instrument as _, debug, info, warn};

use crate::cancel::{AbortHandle, CancelSignal};
use crate::config::{BridgeConfig, HistoryMode};
use crate::demux::Demultiplexer;
use crate::engine::{GraphEngine, GraphInput, ResumeCommand};
use crate::errors::{BridgeError, EngineError, RunFailure, run_failure_from_engine_error};
use crate::interrupt::{Interrupt, resolve_pending_interrupt};
use crate::message::{ChatMessage, ChatRole, EngineContent, EngineMessage};
use crate::queue::{OutputQueue, QueueReader};
use crate::session::RunnableConfig;
use crate::stream::{ChatChunk, StreamItem, StreamResult, TextGenerationStream};
use crate::translate::translate_history;

/// Lifecycle phase of a bridge run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RunPhase {
    /// Placeholder pushed; history not yet translated.
    Init,
    /// Streaming a fresh input.
    Running,
    /// Streaming a resume command for a previously suspended execution.
    Resumed,
    /// The engine paused mid-stream awaiting input.
    Suspended,
    /// Stream ended; checking for a follow-up interrupt.
    Completing,
    Aborted,
    Failed(String),
    /// Output queue closed. Terminal.
    Closed,
}

/// How a closed run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RunOutcome {
    /// The graph finished without a pending interrupt.
    Completed,
    /// The graph is waiting on the user; its question was the last chunk.
    Suspended,
    Aborted,
    Failed,
}

struct Lifecycle {
    aborted: bool,
    closed: bool,
    phase: RunPhase,
    outcome: Option<RunOutcome>,
    failure: Option<RunFailure>,
}

/// Lifecycle flags and output queue shared by the run task, the consumer
/// handle, and the abort handle.
///
/// Every push goes through [`StreamState::emit`] under the same lock that
/// `abort` and `close` take, so nothing is delivered after either.
pub(crate) struct StreamState {
    thread_id: String,
    queue: OutputQueue<StreamResult>,
    lifecycle: Mutex<Lifecycle>,
}

impl StreamState {
    pub(crate) fn new(thread_id: String, queue: OutputQueue<StreamResult>) -> Self {
        Self {
            thread_id,
            queue,
            lifecycle: Mutex::new(Lifecycle {
                aborted: false,
                closed: false,
                phase: RunPhase::Init,
                outcome: None,
                failure: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Pushes an item unless the run was aborted or closed.
    pub(crate) fn emit(&self, item: StreamResult) -> bool {
        let lifecycle = self.lock();
        if lifecycle.aborted || lifecycle.closed {
            return false;
        }
        self.queue.put(item)
    }

    /// Closes the output queue. Returns `true` only the first time.
    pub(crate) fn close(&self) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.closed {
            return false;
        }
        lifecycle.closed = true;
        lifecycle.phase = RunPhase::Closed;
        self.queue.close()
    }

    /// Marks the run aborted. No-op (returns `false`) once closed or aborted.
    pub(crate) fn mark_aborted(&self) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.closed || lifecycle.aborted {
            return false;
        }
        lifecycle.aborted = true;
        true
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn set_phase(&self, phase: RunPhase) {
        let mut lifecycle = self.lock();
        if lifecycle.closed {
            return;
        }
        debug!(thread_id = %self.thread_id, from = ?lifecycle.phase, to = ?phase, "run phase");
        lifecycle.phase = phase;
    }

    fn set_outcome(&self, outcome: RunOutcome) {
        self.lock().outcome = Some(outcome);
    }

    pub(crate) fn phase(&self) -> RunPhase {
        self.lock().phase.clone()
    }

    pub(crate) fn outcome(&self) -> Option<RunOutcome> {
        self.lock().outcome
    }

    /// Records the terminal failure and delivers it to the consumer.
    fn fail(&self, failure: RunFailure) {
        let mut lifecycle = self.lock();
        if lifecycle.closed {
            return;
        }
        lifecycle.phase = RunPhase::Failed(failure.to_string());
        lifecycle.failure = Some(failure.clone());
        if !lifecycle.aborted {
            self.queue.put(Err(failure));
        }
    }

    pub(crate) fn failure(&self) -> Option<RunFailure> {
        self.lock().failure.clone()
    }
}

/// Closes the queue however the run task exits, including panics and
/// runtime shutdown.
struct CloseGuard(Arc<StreamState>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        if self.0.close() {
            debug!(thread_id = %self.0.thread_id(), "output queue closed");
        }
    }
}

/// Everything one run task needs.
pub(crate) struct RunContext {
    pub(crate) engine: Arc<dyn GraphEngine>,
    pub(crate) config: Arc<BridgeConfig>,
    pub(crate) runnable: RunnableConfig,
    pub(crate) history: Vec<ChatMessage>,
    pub(crate) state: Arc<StreamState>,
    pub(crate) cancel: CancelSignal,
}

/// Starts the run task and returns the consumer handle.
pub(crate) fn spawn_run(
    ctx: RunContext,
    request_id: String,
    reader: QueueReader<StreamResult>,
    abort_handle: AbortHandle,
) -> BridgeStream {
    let state = ctx.state.clone();
    let span = tracing::info_span!(
        "bridge_run",
        thread_id = %ctx.runnable.thread_id(),
        request_id = %request_id,
        engine = ctx.engine.name(),
    );
    let task = tokio::spawn(run_task(ctx).instrument(span));
    BridgeStream {
        request_id,
        reader,
        state,
        abort_handle,
        task: Some(task),
    }
}

async fn run_task(ctx: RunContext) {
    let _guard = CloseGuard(ctx.state.clone());
    let state = ctx.state.clone();
    let outcome = drive(ctx).await;
    info!(?outcome, "bridge run finished");
    state.set_outcome(outcome);
}

/// Awaits `fut` unless cancellation fires first.
async fn or_cancelled<F: Future>(cancel: &mut CancelSignal, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

fn aborted(state: &StreamState) -> RunOutcome {
    info!("bridge run cancelled");
    state.set_phase(RunPhase::Aborted);
    RunOutcome::Aborted
}

fn failed(state: &StreamState, failure: RunFailure) -> RunOutcome {
    warn!(error = %failure, "bridge run failed");
    state.fail(failure);
    RunOutcome::Failed
}

async fn drive(ctx: RunContext) -> RunOutcome {
    let RunContext {
        engine,
        config,
        runnable,
        history,
        state,
        mut cancel,
    } = ctx;

    let translated = match translate_history(&history) {
        Ok(messages) => messages,
        Err(err) => {
            return failed(
                &state,
                RunFailure::UnsupportedContent {
                    message: err.to_string(),
                },
            );
        }
    };

    let Some(pending) =
        or_cancelled(&mut cancel, resolve_pending_interrupt(engine.as_ref(), &runnable)).await
    else {
        return aborted(&state);
    };
    let input = build_input(&config, &history, translated, pending.as_ref());
    let resuming = input.is_resume();
    info!(resuming, "starting engine stream");
    state.set_phase(if resuming {
        RunPhase::Resumed
    } else {
        RunPhase::Running
    });

    let engine_cancel = cancel.clone();
    let started = match or_cancelled(
        &mut cancel,
        engine.stream(input, &runnable, engine_cancel),
    )
    .await
    {
        Some(started) => started,
        None => return aborted(&state),
    };

    let mut suspended = false;
    match started {
        Ok(mut events) => {
            let demux = Demultiplexer::new(config.flush_after_narration);
            let mut seq = 0_u64;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return aborted(&state),
                    next = events.next() => match next {
                        Some(Ok(event)) => {
                            for item in demux.items(&event) {
                                debug!(seq, "delivering stream item");
                                seq = seq.saturating_add(1);
                                if !state.emit(Ok(item)) {
                                    return aborted(&state);
                                }
                            }
                        }
                        Some(Err(err)) if err.is_suspension() => {
                            suspended = true;
                            break;
                        }
                        Some(Err(EngineError::Cancelled)) if cancel.is_cancelled() => {
                            return aborted(&state);
                        }
                        Some(Err(err)) => return failed(&state, run_failure_from_engine_error(&err)),
                        None => break,
                    },
                }
            }
        }
        Err(err) if err.is_suspension() => suspended = true,
        Err(err) => return failed(&state, run_failure_from_engine_error(&err)),
    }

    if suspended {
        info!("engine suspended execution");
        state.set_phase(RunPhase::Suspended);
    }
    state.set_phase(RunPhase::Completing);

    let Some(next_question) =
        or_cancelled(&mut cancel, resolve_pending_interrupt(engine.as_ref(), &runnable)).await
    else {
        return aborted(&state);
    };
    match next_question {
        Some(interrupt) => {
            if let Some(chunk) = ChatChunk::assistant(None, interrupt.value)
                && !state.emit(Ok(StreamItem::Chunk(chunk)))
            {
                return aborted(&state);
            }
            RunOutcome::Suspended
        }
        None if suspended => RunOutcome::Suspended,
        None => RunOutcome::Completed,
    }
}

/// Chooses the engine input: a resume command when an interrupt is pending,
/// otherwise the translated history under the configured input key.
pub(crate) fn build_input(
    config: &BridgeConfig,
    history: &[ChatMessage],
    translated: Vec<EngineMessage>,
    pending: Option<&Interrupt>,
) -> GraphInput {
    let last_user = history
        .iter()
        .rposition(|msg| msg.role == ChatRole::User)
        .and_then(|idx| translated.get(idx).cloned());

    if let Some(interrupt) = pending {
        let answer = last_user.unwrap_or_else(|| {
            warn!("resuming without a user message; sending an empty answer");
            EngineMessage::human(EngineContent::Text(String::new()))
        });
        debug!(task = ?interrupt.task, "answering pending interrupt");
        return GraphInput::Resume(ResumeCommand::new(&interrupt.value, answer));
    }

    let messages = match config.history {
        HistoryMode::Full => translated,
        HistoryMode::LastUser => last_user.into_iter().collect(),
    };
    GraphInput::Messages {
        key: config.input_key.clone(),
        messages,
    }
}

/// Consumer handle for one bridge run.
///
/// The first item is always a [`StreamItem::Placeholder`]. Items follow in
/// the order the engine produced them; a failed run ends with one `Err`.
/// Dropping the handle aborts the run.
pub struct BridgeStream {
    request_id: String,
    reader: QueueReader<StreamResult>,
    state: Arc<StreamState>,
    abort_handle: AbortHandle,
    task: Option<JoinHandle<()>>,
}

impl BridgeStream {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn thread_id(&self) -> &str {
        self.state.thread_id()
    }

    /// Returns a handle that can cancel the run from elsewhere.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    /// Set once the run task has finished.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.state.outcome()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Waits for the next item; `None` after close.
    pub async fn next_item(&mut self) -> Option<StreamResult> {
        self.reader.next().await
    }

    /// Drains the stream and waits for the run task to finish.
    ///
    /// A failed run yields its terminal failure even when the consumer
    /// already read that item.
    pub async fn finish(mut self) -> Result<RunOutcome, BridgeError> {
        while self.reader.next().await.is_some() {}
        self.join().await;
        if let Some(failure) = self.state.failure() {
            return Err(BridgeError::RunFailed(failure));
        }
        self.state.outcome().ok_or_else(|| {
            BridgeError::RunFailed(RunFailure::Protocol {
                message: "run task ended without an outcome".into(),
            })
        })
    }

    /// Drains the stream and concatenates chunk text.
    pub async fn collect_text(mut self) -> Result<String, BridgeError> {
        let mut text = String::new();
        while let Some(item) = self.reader.next().await {
            match item {
                Ok(item) => {
                    if let Some(chunk) = item.text() {
                        text.push_str(chunk);
                    }
                }
                Err(failure) => return Err(BridgeError::RunFailed(failure)),
            }
        }
        self.join().await;
        if let Some(failure) = self.state.failure() {
            return Err(BridgeError::RunFailed(failure));
        }
        Ok(text)
    }

    async fn join(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "bridge run task did not complete cleanly");
        }
    }
}

#[async_trait::async_trait]
impl TextGenerationStream for BridgeStream {
    async fn next_chunk(&mut self) -> Option<StreamResult> {
        self.next_item().await
    }

    async fn close(&mut self) {
        self.abort_handle.abort();
        while self.reader.next().await.is_some() {}
        self.join().await;
    }

    fn abort(&self) {
        self.abort_handle.abort();
    }
}

impl Stream for BridgeStream {
    type Item = StreamResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamResult>> {
        Pin::new(&mut self.reader).poll_next(cx)
    }
}

impl Drop for BridgeStream {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentPart, EngineRole};

    fn translated(history: &[ChatMessage]) -> Vec<EngineMessage> {
        translate_history(history).expect("translate")
    }

    #[test]
    fn fresh_input_uses_full_history_under_input_key() {
        let history = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
        ];
        let config = BridgeConfig::default().input_key("conversation");
        let input = build_input(&config, &history, translated(&history), None);
        assert_eq!(
            input,
            GraphInput::Messages {
                key: "conversation".into(),
                messages: translated(&history),
            }
        );
    }

    #[test]
    fn last_user_mode_sends_one_message() {
        let history = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
            ChatMessage::assistant("trailing"),
        ];
        let config = BridgeConfig::default().history(HistoryMode::LastUser);
        match build_input(&config, &history, translated(&history), None) {
            GraphInput::Messages { messages, .. } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].content, EngineContent::Text("second".into()));
            }
            other => panic!("expected messages input, got {other:?}"),
        }
    }

    #[test]
    fn pending_interrupt_builds_resume_from_last_user_message() {
        let history = vec![
            ChatMessage::assistant("What's your name?"),
            ChatMessage::user(crate::message::ChatContent::Parts(vec![ContentPart::text(
                "Ada",
            )])),
        ];
        let interrupt = Interrupt {
            value: "What's your name?".into(),
            task: None,
        };
        let input = build_input(
            &BridgeConfig::default(),
            &history,
            translated(&history),
            Some(&interrupt),
        );
        let GraphInput::Resume(command) = input else {
            panic!("expected resume");
        };
        assert_eq!(command.content, translated(&history)[1].content);
        assert_eq!(command.messages[0], EngineMessage::ai("What's your name?"));
        assert_eq!(command.messages[1].role, EngineRole::Human);
        assert_eq!(command.messages[1].content, command.content);
    }

    #[test]
    fn resume_without_user_message_sends_empty_answer() {
        let interrupt = Interrupt {
            value: "Anything else?".into(),
            task: None,
        };
        let GraphInput::Resume(command) =
            build_input(&BridgeConfig::default(), &[], Vec::new(), Some(&interrupt))
        else {
            panic!("expected resume");
        };
        assert_eq!(command.content, EngineContent::Text(String::new()));
    }

    #[test]
    fn emit_is_refused_after_abort_and_close() {
        let (queue, _reader) = crate::queue::output_queue();
        let state = StreamState::new("t".into(), queue);
        assert!(state.emit(Ok(StreamItem::Flush)));
        assert!(state.mark_aborted());
        assert!(!state.emit(Ok(StreamItem::Flush)));
        assert!(state.close());
        assert!(!state.close());
        assert_eq!(state.phase(), RunPhase::Closed);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_delivered_once() {
        let (queue, mut reader) = crate::queue::output_queue();
        let state = StreamState::new("t".into(), queue);
        let failure = RunFailure::Engine {
            message: "boom".into(),
        };
        state.fail(failure.clone());
        assert!(state.close());
        state.fail(RunFailure::Protocol {
            message: "late".into(),
        });

        assert_eq!(state.failure(), Some(failure.clone()));
        assert_eq!(reader.next().await, Some(Err(failure)));
        assert_eq!(reader.next().await, None);
    }
}
