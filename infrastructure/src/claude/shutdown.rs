//! Graceful-then-forced termination of the completion CLI.
//!
//! Escalation order:
//!
//! 1. close stdin, which a well-behaved CLI treats as end of session (bounded by `grace`)
//! 2. after `grace`, send a termination request (SIGTERM on unix)
//! 3. at `hard_deadline` from the start, kill the process
//!
//! Every step is skipped once exit has been observed.

use super::process::ProcessHandle;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Timings for [`ShutdownSequencer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPlan {
    /// Wait after closing stdin before requesting termination
    pub grace: Duration,
    /// Total time, measured from the start, before the process is killed
    pub hard_deadline: Duration,
}

impl Default for ShutdownPlan {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(500),
            hard_deadline: Duration::from_secs(5),
        }
    }
}

/// How a shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// No process was running
    NotRunning,
    /// The process exited after stdin was closed
    Graceful,
    /// The process exited after a termination request
    Terminated,
    /// The process had to be killed
    Killed,
}

impl fmt::Display for ShutdownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShutdownOutcome::NotRunning => "not running",
            ShutdownOutcome::Graceful => "exited on end of input",
            ShutdownOutcome::Terminated => "terminated",
            ShutdownOutcome::Killed => "killed",
        };
        write!(f, "{}", s)
    }
}

pub(crate) struct ShutdownSequencer {
    plan: ShutdownPlan,
}

impl ShutdownSequencer {
    pub(crate) fn new(plan: ShutdownPlan) -> Self {
        Self { plan }
    }

    /// Drive `process` to exit and report which step achieved it.
    pub(crate) async fn run(&self, process: &ProcessHandle) -> ShutdownOutcome {
        if process.has_exited() {
            return ShutdownOutcome::NotRunning;
        }
        let started = Instant::now();

        // A turn blocked writing to a full pipe holds stdin; escalate anyway.
        if tokio::time::timeout(self.plan.grace, process.close_stdin())
            .await
            .is_err()
        {
            debug!(
                "Stdin of completion CLI (pid {}) still busy after {:?}",
                process.pid(),
                self.plan.grace
            );
        }
        let grace_left = self.plan.grace.saturating_sub(started.elapsed());
        if wait_for_exit(process, grace_left).await {
            return ShutdownOutcome::Graceful;
        }

        if process.terminate() {
            debug!(
                "Completion CLI (pid {}) still running after {:?}, sent termination request",
                process.pid(),
                self.plan.grace
            );
        }
        let remaining = self.plan.hard_deadline.saturating_sub(started.elapsed());
        if wait_for_exit(process, remaining).await {
            return ShutdownOutcome::Terminated;
        }

        warn!(
            "Completion CLI (pid {}) did not exit within {:?}, killing it",
            process.pid(),
            self.plan.hard_deadline
        );
        process.kill();
        process.wait_exit().await;
        ShutdownOutcome::Killed
    }
}

async fn wait_for_exit(process: &ProcessHandle, within: Duration) -> bool {
    tokio::time::timeout(within, process.wait_exit())
        .await
        .is_ok()
}
