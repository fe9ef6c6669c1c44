//! Line framing and message decoding for the completion CLI's stdout.
//!
//! The CLI writes one JSON object per line, but a single read from the pipe
//! may end mid-line or carry several lines at once. [`LineBuffer`] holds the
//! partial tail between reads and yields fully decoded messages.

use super::error::Result;
use super::protocol::{ProtocolMessage, UserEnvelope};
use serde_json::Value;
use tracing::{debug, trace};

/// Accumulates raw stdout bytes and splits them into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and decode every complete line it finishes.
    ///
    /// Text after the last newline is kept for the next call. Blank lines,
    /// non-JSON lines and unknown message types produce nothing.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProtocolMessage> {
        self.pending.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(message) = decode_line(line) {
                messages.push(message);
            }
        }
        messages
    }

    /// Bytes received after the last newline.
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }
}

/// Decode one line of CLI output.
///
/// Returns `None` for anything that is not a recognised protocol message:
/// invalid JSON, objects without a `type`, and types this service does not
/// act on (`user` echoes, `stream_event`, ...).
pub fn decode_line(line: &str) -> Option<ProtocolMessage> {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring non-JSON CLI output ({}): {}", e, preview(line));
            return None;
        }
    };

    let Some(kind) = value.get("type").and_then(|t| t.as_str()) else {
        trace!("Ignoring CLI output without a type: {}", preview(line));
        return None;
    };

    match kind {
        "assistant" => {
            let text = extract_text_blocks(&value);
            if text.is_empty() {
                None
            } else {
                Some(ProtocolMessage::AssistantFragment(text))
            }
        }
        "result" => {
            let text = value
                .get("result")
                .and_then(|r| r.as_str())
                .map(str::to_string);
            if value.get("is_error").and_then(|e| e.as_bool()) == Some(true) {
                let reason = text
                    .filter(|t| !t.is_empty())
                    .or_else(|| {
                        value
                            .get("subtype")
                            .and_then(|s| s.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "Unknown error".to_string());
                Some(ProtocolMessage::TurnError(reason))
            } else {
                Some(ProtocolMessage::TurnResult(text))
            }
        }
        "error" => Some(ProtocolMessage::TurnError(extract_error_message(&value))),
        "system" => Some(ProtocolMessage::System),
        other => {
            trace!("Ignoring CLI message type '{}'", other);
            None
        }
    }
}

/// Encode a user turn as a single protocol line, newline included.
pub fn encode_user_turn(text: &str) -> Result<String> {
    let mut line = serde_json::to_string(&UserEnvelope::user(text))?;
    line.push('\n');
    Ok(line)
}

/// Concatenate the `text` blocks of an assistant message.
fn extract_text_blocks(value: &Value) -> String {
    let Some(blocks) = value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array())
    else {
        return String::new();
    };

    blocks
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .collect()
}

fn extract_error_message(value: &Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| value.get("message").and_then(|m| m.as_str()))
        .or_else(|| value.get("error").and_then(|e| e.as_str()))
        .unwrap_or("Unknown error")
        .to_string()
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(120) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_assistant_text_blocks() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hi "},{"type":"tool_use","id":"t1"},{"type":"text","text":"there"}]}}"#;
        assert_eq!(
            decode_line(line),
            Some(ProtocolMessage::AssistantFragment("Hi there".to_string()))
        );
    }

    #[test]
    fn assistant_without_text_is_ignored() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1"}]}}"#;
        assert_eq!(decode_line(line), None);
    }

    #[test]
    fn decodes_result_with_and_without_text() {
        assert_eq!(
            decode_line(r#"{"type":"result","result":"done"}"#),
            Some(ProtocolMessage::TurnResult(Some("done".to_string())))
        );
        assert_eq!(
            decode_line(r#"{"type":"result","subtype":"success"}"#),
            Some(ProtocolMessage::TurnResult(None))
        );
    }

    #[test]
    fn result_flagged_as_error_becomes_turn_error() {
        assert_eq!(
            decode_line(r#"{"type":"result","is_error":true,"result":"quota exceeded"}"#),
            Some(ProtocolMessage::TurnError("quota exceeded".to_string()))
        );
        assert_eq!(
            decode_line(r#"{"type":"result","is_error":true,"subtype":"error_max_turns"}"#),
            Some(ProtocolMessage::TurnError("error_max_turns".to_string()))
        );
    }

    #[test]
    fn decodes_error_message_variants() {
        assert_eq!(
            decode_line(r#"{"type":"error","error":{"message":"rate limited"}}"#),
            Some(ProtocolMessage::TurnError("rate limited".to_string()))
        );
        assert_eq!(
            decode_line(r#"{"type":"error","message":"bad input"}"#),
            Some(ProtocolMessage::TurnError("bad input".to_string()))
        );
        assert_eq!(
            decode_line(r#"{"type":"error"}"#),
            Some(ProtocolMessage::TurnError("Unknown error".to_string()))
        );
    }

    #[test]
    fn ignores_noise() {
        assert_eq!(decode_line("Loading model..."), None);
        assert_eq!(decode_line(r#"{"no_type":true}"#), None);
        assert_eq!(decode_line(r#"{"type":"stream_event"}"#), None);
        assert_eq!(
            decode_line(r#"{"type":"system","subtype":"init"}"#),
            Some(ProtocolMessage::System)
        );
    }

    #[test]
    fn partial_line_is_held_until_completed() {
        let mut buffer = LineBuffer::new();

        let messages = buffer.push(br#"{"type":"result","res"#);
        assert!(messages.is_empty());
        assert!(!buffer.remainder().is_empty());

        let messages = buffer.push(b"ult\":\"ok\"}\n");
        assert_eq!(
            messages,
            vec![ProtocolMessage::TurnResult(Some("ok".to_string()))]
        );
        assert!(buffer.remainder().is_empty());
    }

    #[test]
    fn one_chunk_with_several_lines_and_noise() {
        let mut buffer = LineBuffer::new();
        let chunk = concat!(
            "{\"type\":\"system\",\"subtype\":\"init\"}\n",
            "\n",
            "warning: something on stdout\n",
            "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"Hi \"}]}}\n",
            "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"there\"}]}}\r\n",
            "{\"type\":\"result\",\"result\":\"\"}\n",
            "{\"type\":\"assi",
        );

        let messages = buffer.push(chunk.as_bytes());
        assert_eq!(
            messages,
            vec![
                ProtocolMessage::System,
                ProtocolMessage::AssistantFragment("Hi ".to_string()),
                ProtocolMessage::AssistantFragment("there".to_string()),
                ProtocolMessage::TurnResult(Some(String::new())),
            ]
        );
        assert_eq!(buffer.remainder(), b"{\"type\":\"assi");
    }

    #[test]
    fn encodes_user_turn_as_single_line() {
        let line = encode_user_turn("line one\nline two").unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "user");
        assert_eq!(value["message"]["role"], "user");
        assert_eq!(value["message"]["content"], "line one\nline two");
    }
}
