use serde::{Deserialize, Serialize};

/// Namespace for deriving thread ids from room/participant session ids.
const THREAD_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x41010b5d_5447_4df5_baf2_97d69f2e9d06);

/// Derives the engine thread id for a voice session.
///
/// The same `sid` always maps to the same thread, so a reconnecting
/// participant resumes its conversation. The sid is hashed exactly as given.
/// Without a `sid` (or with an empty one) a random thread is created.
pub fn thread_id_for(sid: Option<&str>) -> String {
    match sid.filter(|s| !s.is_empty()) {
        Some(sid) => uuid::Uuid::new_v5(&THREAD_NAMESPACE, sid.as_bytes()).to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    }
}

/// `configurable` section of an engine invocation config.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Configurable {
    pub thread_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Per-invocation engine config carrying the session correlation key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnableConfig {
    pub configurable: Configurable,
}

impl RunnableConfig {
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            configurable: Configurable {
                thread_id: thread_id.into(),
                extra: serde_json::Map::new(),
            },
        }
    }

    /// Adds an extra `configurable` entry (for example a user id).
    pub fn with_configurable(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.configurable.extra.insert(key.into(), value);
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.configurable.thread_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_is_stable_per_sid() {
        let a = thread_id_for(Some("PA_room42"));
        let b = thread_id_for(Some("PA_room42"));
        let c = thread_id_for(Some("PA_room43"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            uuid::Uuid::parse_str(&a).expect("uuid").get_version_num(),
            5
        );
    }

    #[test]
    fn sid_is_hashed_verbatim() {
        assert_eq!(
            thread_id_for(Some("PA_room42")),
            "d3b48a43-45af-59b3-93dc-5965233c6428"
        );
        assert_eq!(
            thread_id_for(Some(" PA_room42 ")),
            "917af208-cf4d-5ae3-8c0c-b8b095f6e087"
        );
    }

    #[test]
    fn missing_sid_generates_random_thread() {
        assert_ne!(thread_id_for(None), thread_id_for(None));
        let empty = thread_id_for(Some(""));
        assert_eq!(
            uuid::Uuid::parse_str(&empty).expect("uuid").get_version_num(),
            4
        );
    }

    #[test]
    fn config_serializes_under_configurable() {
        let config = RunnableConfig::for_thread("abc")
            .with_configurable("user_id", serde_json::json!("u-1"));
        assert_eq!(
            serde_json::to_value(&config).expect("serialize"),
            serde_json::json!({"configurable": {"thread_id": "abc", "user_id": "u-1"}})
        );
    }
}
