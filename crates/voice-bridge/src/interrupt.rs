//! Pending-interrupt lookup.

use tracing::{debug, warn};

use crate::engine::{GraphEngine, StateSnapshot};
use crate::session::RunnableConfig;

/// A suspension point whose value can be relayed to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interrupt {
    pub value: String,
    /// Name (or id) of the task that raised it, when the engine reports one.
    pub task: Option<String>,
}

/// Returns the most recent string-valued interrupt pending on the thread.
///
/// This is a best-effort read: a failed state query is logged and reported
/// as "nothing pending".
pub async fn resolve_pending_interrupt(
    engine: &dyn GraphEngine,
    config: &RunnableConfig,
) -> Option<Interrupt> {
    match engine.get_state(config).await {
        Ok(snapshot) => {
            let found = latest_string_interrupt(&snapshot);
            debug!(
                thread_id = %config.thread_id(),
                engine = engine.name(),
                pending = found.is_some(),
                "resolved pending interrupt"
            );
            found
        }
        Err(err) => {
            warn!(
                thread_id = %config.thread_id(),
                engine = engine.name(),
                error = %err,
                "state query failed; assuming no pending interrupt"
            );
            None
        }
    }
}

/// Scans interrupts in reverse emission order; non-string values are skipped.
pub fn latest_string_interrupt(snapshot: &StateSnapshot) -> Option<Interrupt> {
    snapshot
        .tasks
        .iter()
        .flat_map(|task| task.interrupts.iter().map(move |record| (task, record)))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find_map(|(task, record)| {
            record.value.as_str().map(|value| Interrupt {
                value: value.to_string(),
                task: task.name.clone().or_else(|| task.id.clone()),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSignal;
    use crate::engine::{EngineEventStream, GraphInput, InterruptRecord, TaskState};
    use crate::errors::EngineError;

    fn task(name: &str, values: Vec<serde_json::Value>) -> TaskState {
        TaskState {
            id: None,
            name: Some(name.into()),
            interrupts: values.into_iter().map(InterruptRecord::new).collect(),
        }
    }

    #[test]
    fn picks_last_string_interrupt_across_tasks() {
        let snapshot = StateSnapshot {
            tasks: vec![
                task("first", vec![serde_json::json!("older question")]),
                task(
                    "second",
                    vec![
                        serde_json::json!("newest question"),
                        serde_json::json!({"form": "not a string"}),
                    ],
                ),
            ],
        };
        assert_eq!(
            latest_string_interrupt(&snapshot),
            Some(Interrupt {
                value: "newest question".into(),
                task: Some("second".into()),
            })
        );
    }

    #[test]
    fn non_string_only_means_nothing_pending() {
        let snapshot = StateSnapshot {
            tasks: vec![task("t", vec![serde_json::json!(42), serde_json::json!(null)])],
        };
        assert_eq!(latest_string_interrupt(&snapshot), None);
        assert_eq!(latest_string_interrupt(&StateSnapshot::default()), None);
    }

    struct StateOnly(Result<StateSnapshot, EngineError>);

    #[async_trait::async_trait]
    impl GraphEngine for StateOnly {
        fn name(&self) -> &str {
            "state-only"
        }

        async fn invoke(
            &self,
            _input: GraphInput,
            _config: &RunnableConfig,
        ) -> Result<serde_json::Value, EngineError> {
            unreachable!("not used in this test")
        }

        async fn stream(
            &self,
            _input: GraphInput,
            _config: &RunnableConfig,
            _cancel: CancelSignal,
        ) -> Result<EngineEventStream, EngineError> {
            unreachable!("not used in this test")
        }

        async fn get_state(&self, _config: &RunnableConfig) -> Result<StateSnapshot, EngineError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn query_failure_degrades_to_none() {
        let engine = StateOnly(Err(EngineError::Http {
            status: 404,
            message: "thread not found".into(),
        }));
        let config = RunnableConfig::for_thread("abc");
        assert_eq!(resolve_pending_interrupt(&engine, &config).await, None);
    }

    #[tokio::test]
    async fn query_success_returns_interrupt() {
        let engine = StateOnly(Ok(StateSnapshot {
            tasks: vec![task("ask", vec![serde_json::json!("Name?")])],
        }));
        let config = RunnableConfig::for_thread("abc");
        let found = resolve_pending_interrupt(&engine, &config)
            .await
            .expect("interrupt");
        assert_eq!(found.value, "Name?");
    }
}
