//! Streaming bridge between a dialogue-graph engine and a voice pipeline's
//! text-generation interface.
//!
//! A [`GraphAdapter`] accepts chat history, runs the graph on the
//! conversation's thread (resuming it when it is paused at an interrupt), and
//! returns a [`BridgeStream`] of ordered chunks, narration, and flush
//! markers.
//!
//! # Streaming from a graph server
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use voice_bridge::engine::remote::RemoteGraph;
//! use voice_bridge::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), BridgeError> {
//! voice_bridge::init_observability();
//! let adapter = GraphAdapter::builder(Arc::new(RemoteGraph::from_env()?))
//!     .config(BridgeConfig::from_env()?)
//!     .session_sid("PA_room42")
//!     .build()?;
//!
//! let mut stream = adapter.chat(vec![ChatMessage::user("Hi")]);
//! while let Some(item) = stream.next_item().await {
//!     match item {
//!         Ok(StreamItem::Chunk(chunk)) => print!("{}", chunk.content()),
//!         Ok(StreamItem::Flush) => println!(),
//!         Ok(StreamItem::Placeholder { .. }) => {}
//!         Err(failure) => eprintln!("run failed: {failure}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Adapter entry point and builder.
pub mod adapter;
/// Cooperative cancellation shared between consumer and engine.
pub mod cancel;
/// Bridge configuration.
pub mod config;
/// Routing of engine events onto output items.
pub mod demux;
/// Engine capability trait and backends.
pub mod engine;
/// Public error types.
pub mod errors;
/// Pending-interrupt lookup.
pub mod interrupt;
/// Chat and engine message models.
pub mod message;
mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Ordered output queue.
pub mod queue;
/// Run lifecycle and the consumer stream handle.
pub mod run;
/// Thread id derivation and per-invocation engine config.
pub mod session;
/// Output items and the text-generation stream contract.
pub mod stream;
/// Chat/engine message translation.
pub mod translate;

pub use adapter::{GraphAdapter, GraphAdapterBuilder};
pub use cancel::{AbortHandle, CancelSignal};
pub use config::{BridgeConfig, HistoryMode};
pub use engine::{
    EngineEvent, EngineEventStream, GraphEngine, GraphInput, InterruptRecord, ResumeCommand,
    StateSnapshot, TaskState,
};
pub use errors::{BridgeError, EngineError, RunFailure, UnsupportedContentError};
pub use interrupt::Interrupt;
pub use message::{
    ChatContent, ChatMessage, ChatRole, ContentPart, EngineContent, EngineMessage, EnginePart,
    EngineRole, MessageFragment,
};
pub use observability::init_observability;
pub use run::{BridgeStream, RunOutcome, RunPhase};
pub use session::{RunnableConfig, thread_id_for};
pub use stream::{ChatChunk, ChoiceDelta, StreamItem, StreamResult, TextGenerationStream};
