//! Stateless remote completion backend
//!
//! Sends each completion as an independent request to the Anthropic
//! Messages API. No process is kept, so there is nothing to warm up and
//! nothing to serialize: concurrent calls run concurrently.

pub mod anthropic;
mod types;

pub use anthropic::{AnthropicBackend, RemoteConfig};
