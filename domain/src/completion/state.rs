//! Provider lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a completion provider.
///
/// Exactly one value holds at any instant. The persistent subprocess
/// supervisor is the only writer; every other component reads it.
///
/// ```text
///            initialize()            warmup done / grace elapsed
/// Stopped ───────────────▶ Starting ─────────────────────────────▶ Ready ⇄ Busy
///    ▲                        │ spawn failed                          │
///    │                        ▼                                       │
///    │                      Error                                     │
///    └──────────────── process exit / shutdown ◀──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// No process is running. The next completion spawns one.
    #[default]
    Stopped,
    /// A process has been spawned and is warming up.
    Starting,
    /// The process is idle and can accept a turn.
    Ready,
    /// A turn is in flight.
    Busy,
    /// The process could not be spawned.
    Error,
}

impl ProviderState {
    /// Whether a live process is able to (eventually) serve a turn.
    pub fn is_running(&self) -> bool {
        matches!(self, ProviderState::Ready | ProviderState::Busy)
    }

    /// Whether `initialize()` must spawn a fresh process from this state.
    pub fn needs_spawn(&self) -> bool {
        matches!(self, ProviderState::Stopped | ProviderState::Error)
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderState::Stopped => write!(f, "stopped"),
            ProviderState::Starting => write!(f, "starting"),
            ProviderState::Ready => write!(f, "ready"),
            ProviderState::Busy => write!(f, "busy"),
            ProviderState::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_stopped() {
        assert_eq!(ProviderState::default(), ProviderState::Stopped);
    }

    #[test]
    fn running_states() {
        assert!(ProviderState::Ready.is_running());
        assert!(ProviderState::Busy.is_running());
        assert!(!ProviderState::Starting.is_running());
        assert!(!ProviderState::Stopped.is_running());
        assert!(!ProviderState::Error.is_running());
    }

    #[test]
    fn only_stopped_and_error_need_spawn() {
        assert!(ProviderState::Stopped.needs_spawn());
        assert!(ProviderState::Error.needs_spawn());
        assert!(!ProviderState::Starting.needs_spawn());
        assert!(!ProviderState::Ready.needs_spawn());
        assert!(!ProviderState::Busy.needs_spawn());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&ProviderState::Busy).unwrap();
        assert_eq!(json, "\"busy\"");
        assert_eq!(ProviderState::Starting.to_string(), "starting");
    }
}
