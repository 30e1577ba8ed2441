use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::BridgeConfig;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "voice-bridge.logs.jsonl";
const DEFAULT_FILTER: &str = "info";

/// Where bridge logs go.
#[derive(Clone, Debug, PartialEq, Eq)]
enum LogSink {
    Disabled,
    /// Compact lines on stdout, with `bridge_run` span fields inline.
    Console,
    /// JSON lines carrying the current span (`thread_id`, `request_id`).
    JsonFile { dir: PathBuf, file_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogSettings {
    sink: LogSink,
    /// Explicit filter directive; falls back to `RUST_LOG`, then `info`.
    filter: Option<String>,
}

impl LogSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = [
            "VOICE_BRIDGE_OBSERVABILITY_ENABLED",
            "VOICE_BRIDGE_OBSERVABILITY",
        ]
        .into_iter()
        .find_map(&lookup)
        .map(|raw| BridgeConfig::env_flag(&raw).unwrap_or(true))
        .unwrap_or(true);

        let sink = if !enabled {
            LogSink::Disabled
        } else if let Some(path) = lookup("VOICE_BRIDGE_JSON_LOG_PATH") {
            json_sink(Path::new(&path))
        } else {
            LogSink::Console
        };

        Self {
            sink,
            filter: lookup("VOICE_BRIDGE_LOG_LEVEL").filter(|f| !f.trim().is_empty()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(filter) = self.filter.as_deref()
            && let Ok(filter) = EnvFilter::try_new(filter)
        {
            return filter;
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

fn json_sink(path: &Path) -> LogSink {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    LogSink::JsonFile { dir, file_name }
}

/// Initialize bridge logging once per process.
///
/// Environment variables:
/// - `VOICE_BRIDGE_OBSERVABILITY_ENABLED` / `VOICE_BRIDGE_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `VOICE_BRIDGE_LOG_LEVEL`: optional filter (`info`, `voice_bridge=debug`, etc.); `RUST_LOG` is the fallback.
/// - `VOICE_BRIDGE_JSON_LOG_PATH`: write JSONL to this file instead of compact stdout lines.
///
/// Every run logs inside a `bridge_run` span carrying `thread_id`,
/// `request_id` and `engine`, so both formats correlate lines per turn.
/// Hosts that install their own subscriber can skip this; later calls are no-ops.
pub fn init_observability() {
    INIT.get_or_init(|| {
        install(LogSettings::from_lookup(|key| std::env::var(key).ok()));
    });
}

fn install(settings: LogSettings) {
    let filter = settings.env_filter();
    match settings.sink {
        LogSink::Disabled => {}
        LogSink::Console => {
            let console = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stdout);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init();
        }
        LogSink::JsonFile { dir, file_name } => {
            let _ = std::fs::create_dir_all(&dir);
            let json = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true)
                .with_writer(tracing_appender::rolling::never(dir, file_name));
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(json)
                .try_init();
        }
    }
}
