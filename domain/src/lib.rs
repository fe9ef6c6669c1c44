//! Domain layer for memvault
//!
//! This crate contains the value objects shared by every layer of the
//! completion provider. It has no dependencies on infrastructure or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! ## Provider state
//!
//! The persistent completion subprocess is driven by a small state machine
//! ([`ProviderState`]): `Stopped → Starting → Ready ⇄ Busy`, with `Error`
//! reserved for a process that could not be spawned at all.
//!
//! ## Completion mode
//!
//! - **Persistent** (default): one long-running CLI subprocess reused across calls
//! - **Remote**: one HTTP round trip per call, no shared process

pub mod completion;
pub mod core;

// Re-export commonly used types
pub use completion::{
    info::ProviderInfo,
    mode::CompletionMode,
    prompt::{PROMPT_SEPARATOR, compose_prompt},
    state::ProviderState,
    stats::StatsSnapshot,
};
pub use core::error::DomainError;
