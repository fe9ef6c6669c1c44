//! Persistent completion CLI adapter
//!
//! Keeps one long-running completion CLI subprocess alive across many
//! independent requests and implements
//! [`CompletionBackend`](memvault_application::CompletionBackend) on top of it.
//!
//! # Layers
//!
//! ```text
//! PersistentCliBackend ─▶ ProcessSupervisor ─▶ TurnCorrelator ─▶ codec ─▶ stdin
//!          ▲                     │ (state machine,                        │
//!          │                     │  spawn/warmup/exit)                    ▼
//!          └──────── TurnCorrelator ◀── LineBuffer ◀──────────────── stdout
//! ```
//!
//! The wire protocol carries no request ids, so exactly one turn may be open
//! per process. [`ProcessSupervisor`](supervisor::ProcessSupervisor) enforces
//! that with a turn lock held for the full turn.

pub mod backend;
pub mod codec;
pub mod config;
pub mod correlator;
pub mod error;
pub(crate) mod process;
pub mod protocol;
pub mod shutdown;
pub mod supervisor;
