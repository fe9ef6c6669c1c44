//! Pairs inbound protocol messages with the single open turn.
//!
//! The wire protocol has no request ids, so a message is attributed to
//! whichever turn is open when it arrives. The correlator holds at most one
//! [`PendingTurn`]; opening a second one is an error. Each turn is resolved
//! exactly once: by a terminal message, by process exit, by its timeout, or
//! by the caller abandoning it.

use super::error::{ProviderError, Result};
use super::protocol::ProtocolMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// A successfully completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub latency: Duration,
}

/// Receiving end of a turn's outcome.
pub type TurnReceiver = oneshot::Receiver<Result<TurnReply>>;

struct PendingTurn {
    id: u64,
    generation: u64,
    accumulated: String,
    started: Instant,
    reply: oneshot::Sender<Result<TurnReply>>,
}

/// Tracks the one in-flight turn and routes messages to it.
#[derive(Default)]
pub struct TurnCorrelator {
    pending: Mutex<Option<PendingTurn>>,
    next_id: AtomicU64,
}

impl TurnCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a turn for the process with the given generation.
    ///
    /// Dropping the returned ticket before the turn resolves abandons it, so
    /// a cancelled caller never leaves a stale turn behind.
    pub fn open(self: &Arc<Self>, generation: u64) -> Result<(TurnTicket, TurnReceiver)> {
        let mut pending = self.lock();
        if pending.is_some() {
            return Err(ProviderError::TurnInFlight);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        *pending = Some(PendingTurn {
            id,
            generation,
            accumulated: String::new(),
            started: Instant::now(),
            reply: tx,
        });
        trace!("Opened turn {} on process generation {}", id, generation);

        Ok((
            TurnTicket {
                id,
                correlator: Arc::clone(self),
            },
            rx,
        ))
    }

    /// Route a message read from the process with the given generation.
    pub fn dispatch(&self, generation: u64, message: ProtocolMessage) {
        let mut pending = self.lock();
        let Some(turn) = pending.as_mut().filter(|t| t.generation == generation) else {
            if message.is_terminal() || matches!(message, ProtocolMessage::AssistantFragment(_)) {
                debug!("Discarding orphaned CLI message: {:?}", message);
            }
            return;
        };

        match message {
            ProtocolMessage::AssistantFragment(text) => turn.accumulated.push_str(&text),
            ProtocolMessage::System => {}
            ProtocolMessage::TurnResult(result) => {
                if let Some(turn) = pending.take() {
                    let latency = turn.started.elapsed();
                    let text = if turn.accumulated.is_empty() {
                        result.unwrap_or_default()
                    } else {
                        turn.accumulated
                    };
                    trace!("Turn {} completed in {:?}", turn.id, latency);
                    let _ = turn.reply.send(Ok(TurnReply { text, latency }));
                }
            }
            ProtocolMessage::TurnError(reason) => {
                if let Some(turn) = pending.take() {
                    trace!("Turn {} failed: {}", turn.id, reason);
                    let _ = turn.reply.send(Err(ProviderError::TurnFailed(reason)));
                }
            }
        }
    }

    /// Fail the open turn because its process is gone.
    ///
    /// Only a turn opened on `generation` is affected.
    pub fn fail_process(&self, generation: u64, reason: &str) -> bool {
        let mut pending = self.lock();
        if !pending.as_ref().is_some_and(|t| t.generation == generation) {
            return false;
        }
        match pending.take() {
            Some(turn) => {
                debug!("Failing turn {}: process exited ({})", turn.id, reason);
                let _ = turn
                    .reply
                    .send(Err(ProviderError::ProcessExited(reason.to_string())));
                true
            }
            None => false,
        }
    }

    /// Drop turn `id` because its deadline passed.
    ///
    /// Returns `false` if the turn already resolved, in which case its
    /// outcome is waiting on the receiver.
    pub fn expire(&self, id: u64) -> bool {
        self.remove(id).is_some()
    }

    /// Whether a turn is currently open.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn remove(&self, id: u64) -> Option<PendingTurn> {
        let mut pending = self.lock();
        if pending.as_ref().is_some_and(|t| t.id == id) {
            pending.take()
        } else {
            None
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingTurn>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Ownership of an open turn held by the caller waiting on it.
pub struct TurnTicket {
    id: u64,
    correlator: Arc<TurnCorrelator>,
}

impl TurnTicket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TurnTicket {
    fn drop(&mut self) {
        if self.correlator.remove(self.id).is_some() {
            debug!("Turn {} abandoned before completion", self.id);
        }
    }
}
