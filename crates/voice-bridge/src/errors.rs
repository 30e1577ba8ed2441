use crate::engine::InterruptRecord;

/// Raised by the message translator when a chat message carries content the
/// engine message schema cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsupportedContentError {
    /// Image parts must reference their data by string (for example a URL).
    #[error("unsupported image content: expected a string reference, got {found}")]
    ImageSource { found: String },
    /// Any content part kind other than text or image.
    #[error("unsupported content part kind: {kind}")]
    PartKind { kind: String },
}

/// Errors raised by a dialogue-graph engine backend.
///
/// `Suspended` is a control-flow signal rather than a fault: the engine paused
/// mid-execution awaiting external input. Use [`EngineError::is_suspension`]
/// instead of matching on message text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Execution paused at one or more interrupts.
    #[error("execution suspended ({} pending interrupt(s))", .interrupts.len())]
    Suspended { interrupts: Vec<InterruptRecord> },
    /// The graph itself failed while executing.
    #[error("engine execution failed: {message}")]
    Execution { message: String },
    /// The engine endpoint answered with a non-success status.
    #[error("engine request failed with status {status}: {message}")]
    Http { status: u16, message: String },
    /// Network or stream I/O failed.
    #[error("engine transport error: {0}")]
    Transport(String),
    /// The engine produced a payload the bridge could not interpret.
    #[error("engine protocol error: {0}")]
    Protocol(String),
    /// The invocation observed its cancel signal and stopped.
    #[error("engine invocation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// True only for the structured suspension signal.
    pub fn is_suspension(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

/// Terminal failure delivered to the consumer as the last stream item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    /// Chat history could not be translated; the engine was never called.
    #[error("unsupported content: {message}")]
    UnsupportedContent { message: String },
    /// The engine failed with something other than a suspension.
    #[error("engine failure: {message}")]
    Engine { message: String },
    /// The bridge detected an invariant violation.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
}

/// Top-level error type for the public bridge API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// Invalid adapter or backend configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input.
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    UnsupportedContent(#[from] UnsupportedContentError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Terminal failure observed on a started stream.
    #[error(transparent)]
    RunFailed(RunFailure),
}

impl From<RunFailure> for BridgeError {
    fn from(value: RunFailure) -> Self {
        BridgeError::RunFailed(value)
    }
}

pub(crate) fn run_failure_from_engine_error(err: &EngineError) -> RunFailure {
    match err {
        EngineError::Protocol(message) => RunFailure::Protocol {
            message: message.clone(),
        },
        other => RunFailure::Engine {
            message: other.to_string(),
        },
    }
}
