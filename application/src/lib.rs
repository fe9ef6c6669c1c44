//! Application layer for memvault
//!
//! This crate contains the completion service, its port definitions and the
//! statistics it reports. It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::{
    completion_backend::{CompletionBackend, CompletionError, CompletionOutput},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
};
pub use use_cases::{completion_service::CompletionService, stats::CompletionStats};
