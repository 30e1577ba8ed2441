use crate::engine::{EngineEvent, InterruptRecord};
use crate::errors::EngineError;
use crate::message::MessageFragment;

/// Server-side error name carried by a run that paused at an interrupt.
const INTERRUPT_ERROR: &str = "GraphInterrupt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder; frames may span network chunks.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, delim_len)) = frame_boundary(&self.buf) {
            let raw: Vec<u8> = self.buf.drain(..end + delim_len).take(end).collect();
            if let Some(frame) = parse_frame(&raw) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data.join("\n"),
    })
}

/// Outcome of interpreting one frame of a run stream.
#[derive(Debug, PartialEq)]
pub(crate) enum FrameOutcome {
    Events(Vec<EngineEvent>),
    /// Run metadata announcing the server-side run id.
    RunStarted(String),
    End,
}

/// Maps one run-stream frame onto engine events.
///
/// Event names may carry a subgraph namespace suffix (`messages|child:1`);
/// only the mode prefix is significant.
pub(crate) fn map_frame(frame: &SseFrame) -> Result<FrameOutcome, EngineError> {
    let mode = frame
        .event
        .as_deref()
        .and_then(|event| event.split('|').next())
        .unwrap_or("message");
    if mode == "end" {
        return Ok(FrameOutcome::End);
    }
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(FrameOutcome::Events(Vec::new()));
    }
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| EngineError::Protocol(format!("invalid SSE JSON frame ({mode}): {e}")))?;

    match mode {
        "metadata" => match value.get("run_id").and_then(|v| v.as_str()) {
            Some(run_id) => Ok(FrameOutcome::RunStarted(run_id.to_string())),
            None => Ok(FrameOutcome::Events(Vec::new())),
        },
        "messages" => {
            let chunk = match &value {
                serde_json::Value::Array(items) => items.first().cloned(),
                other => Some(other.clone()),
            };
            let Some(chunk) = chunk else {
                return Ok(FrameOutcome::Events(Vec::new()));
            };
            let fragment: MessageFragment = serde_json::from_value(chunk)
                .map_err(|e| EngineError::Protocol(format!("invalid message chunk: {e}")))?;
            Ok(FrameOutcome::Events(vec![EngineEvent::Message(fragment)]))
        }
        "custom" => Ok(FrameOutcome::Events(vec![EngineEvent::Custom(value)])),
        "error" => Err(map_error(&value)),
        _ => Ok(FrameOutcome::Events(Vec::new())),
    }
}

fn map_error(value: &serde_json::Value) -> EngineError {
    let name = value.get("error").and_then(|v| v.as_str()).unwrap_or_default();
    let message = value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("graph run failed");
    if name == INTERRUPT_ERROR {
        let interrupts = value
            .get("interrupts")
            .and_then(|v| serde_json::from_value::<Vec<InterruptRecord>>(v.clone()).ok())
            .unwrap_or_default();
        return EngineError::Suspended { interrupts };
    }
    if name.is_empty() {
        EngineError::execution(message)
    } else {
        EngineError::execution(format!("{name}: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: serde_json::Value) -> SseFrame {
        SseFrame {
            event: Some(event.into()),
            data: data.to_string(),
        }
    }

    #[test]
    fn decoder_handles_partial_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        assert!(
            decoder
                .push_chunk(b"event: messages\ndata: [{\"content\":\"Hel")
                .is_empty()
        );
        let frames = decoder.push_chunk(b"lo\"},{}]\n\nevent: end\r\n\r\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("messages"));
        assert_eq!(frames[0].data, "[{\"content\":\"Hello\"},{}]");
        assert_eq!(frames[1].event.as_deref(), Some("end"));
    }

    #[test]
    fn decoder_skips_comments_and_joins_data_lines() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(b": keep-alive\n\ndata: a\ndata: b\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: None,
                data: "a\nb".into()
            }]
        );
    }

    #[test]
    fn message_tuples_become_fragments() {
        let outcome = map_frame(&frame(
            "messages",
            serde_json::json!([
                {"id": "m1", "content": "Hi", "type": "AIMessageChunk"},
                {"langgraph_node": "agent"}
            ]),
        ))
        .expect("maps");
        assert_eq!(
            outcome,
            FrameOutcome::Events(vec![EngineEvent::Message(
                MessageFragment::text("Hi").with_id("m1")
            )])
        );
    }

    #[test]
    fn namespaced_custom_events_are_recognised() {
        let payload = serde_json::json!({"type": "flush"});
        let outcome = map_frame(&frame("custom|child:42", payload.clone())).expect("maps");
        assert_eq!(outcome, FrameOutcome::Events(vec![EngineEvent::Custom(payload)]));
    }

    #[test]
    fn metadata_and_end_frames_drive_run_bookkeeping() {
        let started = map_frame(&frame("metadata", serde_json::json!({"run_id": "run-7"})));
        assert_eq!(started.expect("maps"), FrameOutcome::RunStarted("run-7".into()));
        let end = SseFrame {
            event: Some("end".into()),
            data: String::new(),
        };
        assert_eq!(map_frame(&end).expect("maps"), FrameOutcome::End);
    }

    #[test]
    fn interrupt_errors_map_to_suspension() {
        let err = map_frame(&frame(
            "error",
            serde_json::json!({"error": "GraphInterrupt", "message": "paused"}),
        ))
        .expect_err("suspends");
        assert!(err.is_suspension());

        let err = map_frame(&frame(
            "error",
            serde_json::json!({"error": "ValueError", "message": "boom"}),
        ))
        .expect_err("fails");
        assert_eq!(err, EngineError::execution("ValueError: boom"));
    }

    #[test]
    fn unknown_modes_are_ignored() {
        let outcome = map_frame(&frame("values", serde_json::json!({"messages": []}))).expect("maps");
        assert_eq!(outcome, FrameOutcome::Events(Vec::new()));
    }
}
