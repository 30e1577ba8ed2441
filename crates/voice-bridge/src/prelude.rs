//! Common imports for typical bridge usage.
pub use crate::{
    AbortHandle, BridgeConfig, BridgeError, BridgeStream, ChatMessage, ChatRole, GraphAdapter,
    GraphEngine, HistoryMode, RunFailure, RunOutcome, StreamItem, TextGenerationStream,
};
