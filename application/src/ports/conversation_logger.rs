//! Port for structured conversation logging.
//!
//! Defines the [`ConversationLogger`] trait for recording completion events
//! (prompt sizes, latencies, failures) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures a
//! machine-readable transcript of completions (JSONL).

use memvault_domain::CompletionMode;
use serde_json::{Value, json};
use std::time::Duration;

/// A structured conversation event for logging.
///
/// Each event has a type string and a JSON payload containing
/// event-specific fields. The adapter adds the timestamp.
pub struct ConversationEvent {
    /// Event type identifier (e.g., "completion", "completion_failed").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    /// A completion that produced a response.
    pub fn completion(
        mode: CompletionMode,
        latency: Duration,
        prompt_bytes: usize,
        response_bytes: usize,
    ) -> Self {
        Self::new(
            "completion",
            json!({
                "mode": mode.to_string(),
                "latency_ms": latency.as_millis() as u64,
                "prompt_bytes": prompt_bytes,
                "response_bytes": response_bytes,
            }),
        )
    }

    /// A completion that failed.
    pub fn completion_failed(
        mode: CompletionMode,
        prompt_bytes: usize,
        error_kind: &str,
        message: &str,
    ) -> Self {
        Self::new(
            "completion_failed",
            json!({
                "mode": mode.to_string(),
                "prompt_bytes": prompt_bytes,
                "error": error_kind,
                "message": message,
            }),
        )
    }
}

/// Port for logging conversation events to a structured log.
///
/// The `log` method is synchronous and non-fallible so logging never
/// disrupts a completion; failures are silently ignored.
pub trait ConversationLogger: Send + Sync {
    /// Record a conversation event.
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_event_payload() {
        let event = ConversationEvent::completion(
            CompletionMode::Persistent,
            Duration::from_millis(1500),
            12,
            34,
        );
        assert_eq!(event.event_type, "completion");
        assert_eq!(event.payload["mode"], "persistent");
        assert_eq!(event.payload["latency_ms"], 1500);
        assert_eq!(event.payload["prompt_bytes"], 12);
        assert_eq!(event.payload["response_bytes"], 34);
    }

    #[test]
    fn failed_event_payload() {
        let event =
            ConversationEvent::completion_failed(CompletionMode::Remote, 5, "timeout", "slow");
        assert_eq!(event.event_type, "completion_failed");
        assert_eq!(event.payload["mode"], "remote");
        assert_eq!(event.payload["error"], "timeout");
        assert_eq!(event.payload["message"], "slow");
    }
}
