//! Infrastructure layer for memvault
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the persistent completion CLI subprocess, the remote
//! completion API, configuration file loading and the JSONL conversation log.

pub mod claude;
pub mod config;
pub mod logging;
pub mod remote;

// Re-export commonly used types
pub use claude::{
    backend::PersistentCliBackend,
    config::SubprocessConfig,
    error::{ProviderError, Result},
    shutdown::{ShutdownOutcome, ShutdownPlan},
    supervisor::ProcessSupervisor,
};
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use logging::JsonlConversationLogger;
pub use remote::{AnthropicBackend, RemoteConfig};
