//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod completion_service;
pub mod stats;
