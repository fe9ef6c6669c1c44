//! Completion service: the public face of the completion provider.
//!
//! [`CompletionService`] hides which [`CompletionBackend`] is active. Callers
//! see the same contract whether completions come from a persistent CLI
//! subprocess or a stateless remote API:
//!
//! - [`initialize`](CompletionService::initialize): idempotent warm start
//! - [`complete`](CompletionService::complete): system preamble + prompt → text
//! - [`shutdown`](CompletionService::shutdown): release the backend
//! - [`stats`](CompletionService::stats) / [`info`](CompletionService::info): snapshots
//!
//! Statistics and the conversation log are fed here, once per call, so both
//! backends are observed identically.

use crate::ports::completion_backend::{CompletionBackend, CompletionError};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::use_cases::stats::CompletionStats;
use memvault_domain::{DomainError, ProviderInfo, StatsSnapshot, compose_prompt};
use std::sync::Arc;
use tracing::{debug, info};

pub struct CompletionService {
    backend: Arc<dyn CompletionBackend>,
    stats: CompletionStats,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl CompletionService {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            stats: CompletionStats::new(),
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    /// Record every completion to a structured conversation log.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    /// Warm up the backend. Safe to call any number of times, concurrently.
    pub async fn initialize(&self) -> Result<bool, CompletionError> {
        let mode = self.backend.mode();
        let ready = self.backend.initialize().await?;
        if ready {
            info!("Completion provider ready ({})", mode.short_description());
        } else {
            info!("Completion provider not available ({})", mode);
        }
        Ok(ready)
    }

    /// Complete `prompt`, prefixed by `system_prompt` when one is given.
    ///
    /// The backend starts itself on demand, and concurrent callers are
    /// serialized by the backend when it can only serve one call at a time.
    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, CompletionError> {
        if prompt.trim().is_empty() {
            return Err(DomainError::EmptyPrompt.into());
        }

        let mode = self.backend.mode();
        let text = compose_prompt(prompt, system_prompt);
        debug!("Dispatching completion ({} bytes, {})", text.len(), mode);

        match self.backend.complete(&text).await {
            Ok(output) => {
                self.stats.record_success(output.latency);
                self.conversation_logger.log(ConversationEvent::completion(
                    mode,
                    output.latency,
                    text.len(),
                    output.text.len(),
                ));
                debug!(
                    "Completion finished in {:?} ({} bytes)",
                    output.latency,
                    output.text.len()
                );
                Ok(output.text)
            }
            Err(e) => {
                self.stats.record_error();
                self.conversation_logger.log(ConversationEvent::completion_failed(
                    mode,
                    text.len(),
                    e.kind(),
                    &e.to_string(),
                ));
                debug!("Completion failed: {}", e);
                Err(e)
            }
        }
    }

    /// Stop the backend. A no-op when nothing is running.
    pub async fn shutdown(&self) -> Result<(), CompletionError> {
        self.backend.shutdown().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            mode: self.backend.mode(),
            pid: self.backend.pid(),
            state: self.backend.state(),
            has_api_key: self.backend.has_api_key(),
        }
    }
}
