use crate::errors::BridgeError;

/// How much chat history is sent when starting a fresh (non-resume) run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Every message in the chat context.
    #[default]
    Full,
    /// Only the most recent user message; the graph keeps its own history.
    LastUser,
}

/// Adapter behavior options.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BridgeConfig {
    /// Graph input field the translated history is keyed under.
    pub input_key: String,
    pub history: HistoryMode,
    /// Emit a flush sentinel right after every narration chunk.
    pub flush_after_narration: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            input_key: "messages".to_string(),
            history: HistoryMode::Full,
            flush_after_narration: false,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

impl BridgeConfig {
    /// Reads overrides from the environment:
    /// - `VOICE_BRIDGE_INPUT_KEY`
    /// - `VOICE_BRIDGE_HISTORY` (`full` or `last_user`)
    /// - `VOICE_BRIDGE_FLUSH_AFTER_NARRATION` (boolean)
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BridgeError> {
        let mut config = Self::default();
        if let Some(key) = lookup("VOICE_BRIDGE_INPUT_KEY") {
            config = config.input_key(key);
        }
        if let Some(mode) = lookup("VOICE_BRIDGE_HISTORY") {
            config.history = match mode.trim().to_ascii_lowercase().as_str() {
                "full" => HistoryMode::Full,
                "last_user" | "last-user" => HistoryMode::LastUser,
                other => {
                    return Err(BridgeError::Config(format!(
                        "VOICE_BRIDGE_HISTORY must be `full` or `last_user`, got `{other}`"
                    )));
                }
            };
        }
        if let Some(raw) = lookup("VOICE_BRIDGE_FLUSH_AFTER_NARRATION") {
            config.flush_after_narration = parse_bool(&raw).ok_or_else(|| {
                BridgeError::Config(format!(
                    "VOICE_BRIDGE_FLUSH_AFTER_NARRATION is not a boolean: `{raw}`"
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    pub fn history(mut self, mode: HistoryMode) -> Self {
        self.history = mode;
        self
    }

    pub fn flush_after_narration(mut self, enabled: bool) -> Self {
        self.flush_after_narration = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), BridgeError> {
        if self.input_key.trim().is_empty() {
            return Err(BridgeError::Validation("input_key must not be empty".into()));
        }
        Ok(())
    }

    pub(crate) fn env_flag(value: &str) -> Option<bool> {
        parse_bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_use_messages_key_and_full_history() {
        let config = BridgeConfig::default();
        assert_eq!(config.input_key, "messages");
        assert_eq!(config.history, HistoryMode::Full);
        assert!(!config.flush_after_narration);
    }

    #[test]
    fn env_overrides_apply() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("VOICE_BRIDGE_INPUT_KEY", "conversation"),
            ("VOICE_BRIDGE_HISTORY", "last_user"),
            ("VOICE_BRIDGE_FLUSH_AFTER_NARRATION", "yes"),
        ]))
        .expect("config");
        assert_eq!(config.input_key, "conversation");
        assert_eq!(config.history, HistoryMode::LastUser);
        assert!(config.flush_after_narration);
    }

    #[test]
    fn invalid_env_values_are_config_errors() {
        assert!(matches!(
            BridgeConfig::from_lookup(lookup(&[("VOICE_BRIDGE_HISTORY", "some")])),
            Err(BridgeError::Config(msg)) if msg.contains("VOICE_BRIDGE_HISTORY")
        ));
        assert!(matches!(
            BridgeConfig::from_lookup(lookup(&[("VOICE_BRIDGE_INPUT_KEY", " ")])),
            Err(BridgeError::Validation(_))
        ));
    }
}
