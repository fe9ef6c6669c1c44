//! Completion provider value objects.
//!
//! - [`state::ProviderState`]: lifecycle state of the backing process
//! - [`mode::CompletionMode`]: which backend serves completions
//! - [`stats::StatsSnapshot`]: point-in-time view of completion counters
//! - [`info::ProviderInfo`]: read-only description of the active provider
//! - [`prompt::compose_prompt`]: system preamble + prompt concatenation

pub mod info;
pub mod mode;
pub mod prompt;
pub mod state;
pub mod stats;
