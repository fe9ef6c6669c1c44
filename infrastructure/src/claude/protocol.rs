//! Line-delimited JSON protocol types for completion CLI communication.
//!
//! Every message is one JSON object followed by a newline, in both
//! directions.
//!
//! # Protocol Overview
//!
//! - **Outbound** (service → CLI): `{"type":"user","message":{"role":"user","content":"..."}}`
//! - **Inbound** (CLI → service), discriminated by `type`:
//!   - `assistant`: `message.content` is a list of blocks; `text` blocks are fragments
//!   - `result`: the turn is complete; `result` may carry the final text
//!   - `error`: the turn failed; `error.message` or `message` carries the reason
//!   - `system`: informational, ignored

use serde::Serialize;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// Outbound user message body
#[derive(Debug, Clone, Serialize)]
pub struct UserMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// Outbound envelope opening a new turn
#[derive(Debug, Clone, Serialize)]
pub struct UserEnvelope<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: UserMessage<'a>,
}

impl<'a> UserEnvelope<'a> {
    pub fn user(content: &'a str) -> Self {
        Self {
            kind: "user",
            message: UserMessage {
                role: Role::User,
                content,
            },
        }
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// A piece of response text emitted before the turn's terminal message.
    AssistantFragment(String),
    /// The turn is complete. Carries the final text if the CLI supplied one.
    TurnResult(Option<String>),
    /// The turn failed.
    TurnError(String),
    /// Informational output.
    System,
}

impl ProtocolMessage {
    /// Whether this message ends the open turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProtocolMessage::TurnResult(_) | ProtocolMessage::TurnError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_envelope_serializes_to_wire_shape() {
        let json = serde_json::to_value(UserEnvelope::user("hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "user",
                "message": { "role": "user", "content": "hello" }
            })
        );
    }

    #[test]
    fn terminal_messages() {
        assert!(ProtocolMessage::TurnResult(None).is_terminal());
        assert!(ProtocolMessage::TurnError("boom".into()).is_terminal());
        assert!(!ProtocolMessage::AssistantFragment("hi".into()).is_terminal());
        assert!(!ProtocolMessage::System.is_terminal());
    }
}
