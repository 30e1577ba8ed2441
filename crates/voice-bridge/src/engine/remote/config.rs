use std::time::Duration;

use crate::errors::BridgeError;

const DEFAULT_BASE_URL: &str = "http://localhost:2024";
const DEFAULT_ASSISTANT_ID: &str = "agent";

/// Configuration for a graph served over HTTP.
#[derive(Clone, Debug)]
pub struct RemoteGraphConfig {
    /// Server root, for example `http://localhost:2024`.
    pub base_url: String,
    /// Assistant (graph) id runs are created against.
    pub assistant_id: String,
    /// Sent as `x-api-key` when present.
    pub api_key: Option<String>,
    /// Default HTTP timeout for non-streaming requests.
    pub timeout: Duration,
}

impl Default for RemoteGraphConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl RemoteGraphConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from `LANGGRAPH_URL`, `LANGGRAPH_ASSISTANT_ID` and
    /// `LANGGRAPH_API_KEY`; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, BridgeError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("LANGGRAPH_URL") {
            config.base_url = url;
        }
        if let Ok(id) = std::env::var("LANGGRAPH_ASSISTANT_ID") {
            config.assistant_id = id;
        }
        config.api_key = std::env::var("LANGGRAPH_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    pub fn assistant_id(mut self, assistant_id: impl Into<String>) -> Self {
        self.assistant_id = assistant_id.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), BridgeError> {
        if self.base_url.trim().is_empty() {
            return Err(BridgeError::Config("graph server base_url must not be empty".into()));
        }
        if self.assistant_id.trim().is_empty() {
            return Err(BridgeError::Config("assistant_id must not be empty".into()));
        }
        Ok(())
    }

    fn thread_url(&self, thread_id: &str) -> String {
        format!("{}/threads/{thread_id}", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn stream_url(&self, thread_id: &str) -> String {
        format!("{}/runs/stream", self.thread_url(thread_id))
    }

    pub(crate) fn wait_url(&self, thread_id: &str) -> String {
        format!("{}/runs/wait", self.thread_url(thread_id))
    }

    pub(crate) fn state_url(&self, thread_id: &str) -> String {
        format!("{}/state", self.thread_url(thread_id))
    }

    pub(crate) fn cancel_url(&self, thread_id: &str, run_id: &str) -> String {
        format!("{}/runs/{run_id}/cancel", self.thread_url(thread_id))
    }
}
