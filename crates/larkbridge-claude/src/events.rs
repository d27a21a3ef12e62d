// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed model of the CLI's stream-json output.
//!
//! Each stdout line is one JSON object dispatched on its `type` field.
//! Unknown outer types, unknown inner stream-event types, and unknown
//! delta types all collapse into `Other` variants so future CLI versions
//! pass through without effect.

use serde::Deserialize;

/// One NDJSON line from the CLI.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliEvent {
    /// Run metadata; carries the session id used for `--resume`.
    System {
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Cumulative snapshot of the assistant message so far.
    Assistant {
        #[serde(default)]
        message: Option<AssistantMessage>,
    },
    /// Wrapped Anthropic stream event.
    StreamEvent {
        #[serde(default)]
        event: Option<StreamPayload>,
    },
    /// CLI-reported error; the raw line is forwarded to the caller.
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Assistant message body: a list of content blocks.
#[derive(Debug, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl AssistantMessage {
    /// Concatenates all text blocks into the cumulative snapshot.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                out.push_str(text);
            }
        }
        out
    }
}

/// One content block inside an assistant message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Inner `event` payload of a `stream_event` line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamPayload {
    MessageStart {
        #[serde(default)]
        message: Option<MessageMeta>,
    },
    ContentBlockStart {},
    ContentBlockDelta {
        #[serde(default)]
        delta: Option<DeltaPayload>,
    },
    ContentBlockStop {},
    MessageDelta {},
    MessageStop {},
    #[serde(other)]
    Other,
}

/// Metadata attached to a `message_start`.
#[derive(Debug, Default, Deserialize)]
pub struct MessageMeta {
    #[serde(default)]
    pub id: Option<String>,
}

/// Delta payload of a `content_block_delta`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeltaPayload {
    TextDelta { text: String },
    InputJsonDelta {},
    #[serde(other)]
    Other,
}

/// Parses one stdout line. Returns `None` for non-JSON lines, which the
/// caller logs and skips.
pub fn parse_line(line: &str) -> Option<CliEvent> {
    serde_json::from_str(line).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_system_event_with_session() {
        let ev = parse_line(r#"{"type":"system","session_id":"sess-1","subtype":"init"}"#);
        match ev {
            Some(CliEvent::System { session_id }) => {
                assert_eq!(session_id.as_deref(), Some("sess-1"));
            }
            other => panic!("expected System, got {other:?}"),
        }
    }

    #[test]
    fn parses_text_delta() {
        let ev = parse_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}}"#,
        );
        match ev {
            Some(CliEvent::StreamEvent {
                event: Some(StreamPayload::ContentBlockDelta { delta }),
            }) => match delta {
                Some(DeltaPayload::TextDelta { text }) => assert_eq!(text, "Hi"),
                other => panic!("expected TextDelta, got {other:?}"),
            },
            other => panic!("expected ContentBlockDelta, got {other:?}"),
        }
    }

    #[test]
    fn parses_message_start_with_id() {
        let ev = parse_line(
            r#"{"type":"stream_event","event":{"type":"message_start","message":{"id":"msg_1","role":"assistant"}}}"#,
        );
        match ev {
            Some(CliEvent::StreamEvent {
                event: Some(StreamPayload::MessageStart { message }),
            }) => {
                assert_eq!(message.unwrap().id.as_deref(), Some("msg_1"));
            }
            other => panic!("expected MessageStart, got {other:?}"),
        }
    }

    #[test]
    fn parses_assistant_snapshot_text() {
        let ev = parse_line(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hel"},{"type":"tool_use","id":"t1","name":"Bash"},{"type":"text","text":"lo"}]}}"#,
        );
        match ev {
            Some(CliEvent::Assistant { message }) => {
                assert_eq!(message.unwrap().text(), "Hello");
            }
            other => panic!("expected Assistant, got {other:?}"),
        }
    }

    #[test]
    fn unknown_outer_type_becomes_other() {
        let ev = parse_line(r#"{"type":"result","total_cost_usd":0.01}"#);
        assert!(matches!(ev, Some(CliEvent::Other)));
    }

    #[test]
    fn unknown_inner_type_becomes_other() {
        let ev = parse_line(
            r#"{"type":"stream_event","event":{"type":"brand_new_event","payload":{}}}"#,
        );
        match ev {
            Some(CliEvent::StreamEvent { event }) => {
                assert!(matches!(event, Some(StreamPayload::Other)));
            }
            other => panic!("expected StreamEvent, got {other:?}"),
        }
    }

    #[test]
    fn tool_input_delta_is_observed_but_inert() {
        let ev = parse_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"cmd\""}}}"#,
        );
        match ev {
            Some(CliEvent::StreamEvent {
                event: Some(StreamPayload::ContentBlockDelta { delta }),
            }) => {
                assert!(matches!(delta, Some(DeltaPayload::InputJsonDelta {})));
            }
            other => panic!("expected ContentBlockDelta, got {other:?}"),
        }
    }

    #[test]
    fn non_json_lines_are_none() {
        assert!(parse_line("plain text diagnostics").is_none());
        assert!(parse_line("").is_none());
    }
}
