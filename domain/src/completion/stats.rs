//! Point-in-time completion statistics.

use serde::{Deserialize, Serialize};

/// Snapshot of completion counters.
///
/// Produced by the completion service's atomic counters. Values only grow
/// for the lifetime of the hosting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Successful completions.
    pub completions: u64,
    /// Sum of successful completion latencies in milliseconds.
    pub total_latency_ms: u64,
    /// Failed completions (timeouts, turn errors, process exits, HTTP failures).
    pub errors: u64,
}

impl StatsSnapshot {
    /// Mean latency of successful completions, `0` when none have finished.
    pub fn average_latency_ms(&self) -> u64 {
        self.total_latency_ms
            .checked_div(self.completions)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(StatsSnapshot::default().average_latency_ms(), 0);
    }

    #[test]
    fn average_is_integer_mean() {
        let snapshot = StatsSnapshot {
            completions: 3,
            total_latency_ms: 1000,
            errors: 7,
        };
        assert_eq!(snapshot.average_latency_ms(), 333);
    }
}
