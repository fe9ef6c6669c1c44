//! Completion backend backed by the persistent CLI process

use super::config::SubprocessConfig;
use super::supervisor::ProcessSupervisor;
use async_trait::async_trait;
use memvault_application::{CompletionBackend, CompletionError, CompletionOutput};
use memvault_domain::{CompletionMode, ProviderState};
use tracing::debug;

/// [`CompletionBackend`] implementation driving one long-lived CLI process
pub struct PersistentCliBackend {
    supervisor: ProcessSupervisor,
}

impl PersistentCliBackend {
    pub fn new(config: SubprocessConfig) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(config),
        }
    }

    /// Create a backend around an existing supervisor
    pub fn with_supervisor(supervisor: ProcessSupervisor) -> Self {
        Self { supervisor }
    }

    /// Get a reference to the underlying supervisor
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }
}

#[async_trait]
impl CompletionBackend for PersistentCliBackend {
    fn mode(&self) -> CompletionMode {
        CompletionMode::Persistent
    }

    async fn initialize(&self) -> Result<bool, CompletionError> {
        Ok(self.supervisor.initialize().await?)
    }

    async fn complete(&self, text: &str) -> Result<CompletionOutput, CompletionError> {
        let reply = self.supervisor.complete(text).await?;
        Ok(CompletionOutput {
            text: reply.text,
            latency: reply.latency,
        })
    }

    async fn shutdown(&self) -> Result<(), CompletionError> {
        let outcome = self.supervisor.shutdown().await?;
        debug!("Persistent backend shutdown: {}", outcome);
        Ok(())
    }

    fn state(&self) -> ProviderState {
        self.supervisor.state()
    }

    fn pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }
}
