use std::sync::{Arc, Mutex};
use std::time::Duration;

use voice_bridge::prelude::*;
use voice_bridge::{
    CancelSignal, EngineError, EngineEvent, EngineEventStream, GraphInput, InterruptRecord,
    MessageFragment, RunnableConfig, StateSnapshot, TaskState, thread_id_for,
};

/// Greets, then pauses to ask for the user's name; answers once resumed.
#[derive(Default)]
struct GreeterGraph {
    paused: Mutex<bool>,
    inputs: Mutex<Vec<GraphInput>>,
}

#[async_trait::async_trait]
impl GraphEngine for GreeterGraph {
    fn name(&self) -> &str {
        "greeter"
    }

    async fn invoke(
        &self,
        _input: GraphInput,
        _config: &RunnableConfig,
    ) -> Result<serde_json::Value, EngineError> {
        Ok(serde_json::Value::Null)
    }

    async fn stream(
        &self,
        input: GraphInput,
        _config: &RunnableConfig,
        _cancel: CancelSignal,
    ) -> Result<EngineEventStream, EngineError> {
        let resuming = input.is_resume();
        self.inputs.lock().expect("inputs").push(input);
        let events: Vec<Result<EngineEvent, EngineError>> = if resuming {
            *self.paused.lock().expect("paused") = false;
            vec![Ok(EngineEvent::Message(MessageFragment::text(
                "Nice to meet you, Ada.",
            )))]
        } else {
            *self.paused.lock().expect("paused") = true;
            vec![
                Ok(EngineEvent::Custom(serde_json::json!({
                    "type": "narrate",
                    "data": {"content": "Give me a second..."}
                }))),
                Ok(EngineEvent::Message(MessageFragment::text("H"))),
                Ok(EngineEvent::Message(MessageFragment::text("i"))),
                Err(EngineError::Suspended {
                    interrupts: vec![InterruptRecord::new("What's your name?")],
                }),
            ]
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn get_state(&self, _config: &RunnableConfig) -> Result<StateSnapshot, EngineError> {
        if !*self.paused.lock().expect("paused") {
            return Ok(StateSnapshot::default());
        }
        Ok(StateSnapshot {
            tasks: vec![TaskState {
                id: Some("task-1".into()),
                name: Some("ask_name".into()),
                interrupts: vec![InterruptRecord::new("What's your name?")],
            }],
        })
    }
}

async fn texts(
    adapter: &GraphAdapter,
    history: Vec<ChatMessage>,
) -> (Vec<String>, Option<RunOutcome>) {
    let mut stream = adapter.chat(history);
    let mut out = Vec::new();
    let drained = async {
        while let Some(item) = stream.next_item().await {
            match item.expect("no failure") {
                StreamItem::Placeholder { .. } => out.push("<placeholder>".to_string()),
                StreamItem::Chunk(chunk) => out.push(chunk.content().to_string()),
                StreamItem::Flush => out.push("<flush>".to_string()),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), drained)
        .await
        .expect("stream closes");
    (out, stream.outcome())
}

#[tokio::test]
async fn interrupted_greeting_resumes_on_the_same_thread() {
    let graph = Arc::new(GreeterGraph::default());
    let adapter = GraphAdapter::builder(graph.clone())
        .session_sid("abc")
        .build()
        .expect("adapter");
    assert_eq!(adapter.thread_id(), thread_id_for(Some("abc")));

    let (first, outcome) = texts(&adapter, vec![ChatMessage::user("Hi")]).await;
    assert_eq!(outcome, Some(RunOutcome::Suspended));
    assert_eq!(
        first,
        vec![
            "<placeholder>",
            "Give me a second...",
            "H",
            "i",
            "What's your name?"
        ]
    );

    let (second, outcome) = texts(
        &adapter,
        vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("What's your name?"),
            ChatMessage::user("Ada"),
        ],
    )
    .await;
    assert_eq!(second, vec!["<placeholder>", "Nice to meet you, Ada."]);
    assert_eq!(outcome, Some(RunOutcome::Completed));

    let inputs = graph.inputs.lock().expect("inputs");
    assert_eq!(inputs.len(), 2);
    assert!(!inputs[0].is_resume());
    match &inputs[1] {
        GraphInput::Resume(command) => {
            assert_eq!(command.messages.len(), 2);
            assert_eq!(
                command.content,
                voice_bridge::EngineContent::Text("Ada".into())
            );
        }
        other => panic!("expected resume, got {other:?}"),
    }
}
