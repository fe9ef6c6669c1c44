//! Lock-free completion counters.

use memvault_domain::StatsSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Completion counters updated only at terminal events of a call.
///
/// Every field is a monotonic counter, so readers never need a lock; a
/// snapshot may mix values from two concurrent updates, which is fine for
/// reporting.
#[derive(Debug, Default)]
pub struct CompletionStats {
    completions: AtomicU64,
    total_latency_ms: AtomicU64,
    errors: AtomicU64,
}

impl CompletionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.total_latency_ms.fetch_add(millis, Ordering::Relaxed);
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completions: self.completions.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
