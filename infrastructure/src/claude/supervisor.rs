//! Lifecycle of the persistent completion CLI process.
//!
//! [`ProcessSupervisor`] owns at most one live process at a time and moves it
//! through [`ProviderState`]:
//!
//! ```text
//! Stopped ──initialize──▶ Starting ──warmup ok / grace elapsed──▶ Ready ⇄ Busy
//!    ▲  ▲                     │                                    │
//!    │  └──── spawn failed ── Error ◀─────────────────────────────┘
//!    └──────── process exited / shutdown ──────────────────────────┘
//! ```
//!
//! When the grace period elapses the warmup turn is still open, so startup
//! lands in `Busy` and the warmup's reply (or timeout) moves it to `Ready`.
//!
//! State lives in a `watch` channel so concurrent callers of
//! [`initialize`](ProcessSupervisor::initialize) can wait for the one startup
//! in progress instead of spawning another process. Turns are serialized by a
//! turn lock held for the full turn, which keeps the correlator's single open
//! turn invariant. The lock queues waiters in arrival order, but callers that
//! first wait out a startup may reach it in any order.

use super::codec;
use super::config::SubprocessConfig;
use super::correlator::{TurnCorrelator, TurnReply};
use super::error::{ProviderError, Result};
use super::process::{self, ExitReport, ProcessHandle};
use super::shutdown::{ShutdownOutcome, ShutdownSequencer};
use memvault_domain::ProviderState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, oneshot, watch};
use tracing::{debug, info, warn};

/// Attempts `complete` makes to find a live process before giving up
const MAX_START_ATTEMPTS: usize = 2;

/// Supervises one long-running completion CLI process.
///
/// Cloning is cheap and yields a handle to the same process. When the last
/// clone is dropped, the process is killed.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: SubprocessConfig,
    state: watch::Sender<ProviderState>,
    correlator: Arc<TurnCorrelator>,
    process: Mutex<Option<Arc<ProcessHandle>>>,
    /// Held for the whole of every turn, the warmup turn included.
    turn_lock: Arc<AsyncMutex<()>>,
    shutdown_lock: AsyncMutex<()>,
    generation: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ProcessSupervisor {
    pub fn new(config: SubprocessConfig) -> Self {
        let (state, _) = watch::channel(ProviderState::Stopped);
        Self {
            inner: Arc::new(Inner {
                config,
                state,
                correlator: Arc::new(TurnCorrelator::new()),
                process: Mutex::new(None),
                turn_lock: Arc::new(AsyncMutex::new(())),
                shutdown_lock: AsyncMutex::new(()),
                generation: AtomicU64::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SubprocessConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ProviderState {
        *self.inner.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ProviderState> {
        self.inner.state.subscribe()
    }

    /// Pid of the live process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.live_process().map(|p| p.pid())
    }

    /// Ensure a process is running and has been warmed up.
    ///
    /// Returns `Ok(true)` once the process is usable. If a startup is already
    /// in progress this waits for it rather than spawning a second process.
    ///
    /// Readiness is optimistic: if the warmup turn has not answered within
    /// the configured grace period the process is reported usable anyway, in
    /// the `Busy` state, and the warmup keeps running in the background, so
    /// the first real turn queues behind it.
    pub async fn initialize(&self) -> Result<bool> {
        let mut claimed = false;
        self.inner.state.send_if_modified(|state| {
            if state.needs_spawn() {
                *state = ProviderState::Starting;
                claimed = true;
                true
            } else {
                false
            }
        });

        if !claimed {
            return self.wait_for_startup().await;
        }

        self.start().await.map(|()| true)
    }

    /// Run one turn: send `text` and wait for the process's reply.
    ///
    /// Starts (or restarts) the process first if none is running. A turn
    /// that errors or times out leaves the process running, unless the
    /// timeout struck while the prompt was still being written.
    pub async fn complete(&self, text: &str) -> Result<TurnReply> {
        for _ in 0..MAX_START_ATTEMPTS {
            self.initialize().await?;

            let _turn = self.inner.turn_lock.lock().await;
            let Some(process) = self.live_process() else {
                debug!("Completion CLI exited while waiting for the turn lock, restarting");
                continue;
            };

            let _busy = BusyGuard::enter(self, process.generation());
            return self
                .run_turn(&process, text, self.inner.config.turn_timeout)
                .await;
        }

        Err(ProviderError::ProcessExited(
            "completion CLI exited before the turn could start".into(),
        ))
    }

    /// Stop the process, escalating from closing stdin to kill.
    ///
    /// Calling this with no live process, or a second time, returns
    /// [`ShutdownOutcome::NotRunning`].
    pub async fn shutdown(&self) -> Result<ShutdownOutcome> {
        let _shutdown = self.inner.shutdown_lock.lock().await;

        let Some(process) = self.inner.lock_process().take() else {
            return Ok(ShutdownOutcome::NotRunning);
        };

        process.begin_shutdown();
        debug!("Shutting down completion CLI (pid {})", process.pid());
        let outcome = ShutdownSequencer::new(self.inner.config.shutdown)
            .run(&process)
            .await;

        let generation = process.generation();
        self.inner.state.send_if_modified(|state| {
            if self.inner.is_current(generation) && *state != ProviderState::Stopped {
                *state = ProviderState::Stopped;
                true
            } else {
                false
            }
        });

        info!(
            "Completion CLI (pid {}) shut down: {}",
            process.pid(),
            outcome
        );
        Ok(outcome)
    }

    async fn wait_for_startup(&self) -> Result<bool> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|state| *state != ProviderState::Starting)
            .await
            .map_err(|_| ProviderError::ProcessExited("supervisor dropped".into()))?;

        match state {
            ProviderState::Ready | ProviderState::Busy => Ok(true),
            ProviderState::Error => Err(ProviderError::Spawn(
                self.inner
                    .lock_last_error()
                    .clone()
                    .unwrap_or_else(|| "startup failed".to_string()),
            )),
            ProviderState::Stopped => Err(ProviderError::ProcessExited(
                "completion CLI exited during startup".into(),
            )),
            ProviderState::Starting => Ok(false),
        }
    }

    /// Spawn a new process and warm it up. The caller has claimed `Starting`.
    async fn start(&self) -> Result<()> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let weak = Arc::downgrade(&self.inner);
        let launched = process::launch(
            &self.inner.config,
            generation,
            Arc::clone(&self.inner.correlator),
            move |report| Inner::handle_exit(&weak, report),
        );

        let process = match launched {
            Ok(process) => process,
            Err(e) => {
                warn!("Failed to start completion CLI: {}", e);
                *self.inner.lock_last_error() = Some(e.to_string());
                self.inner.state.send_replace(ProviderState::Error);
                return Err(e);
            }
        };

        *self.inner.lock_last_error() = None;
        *self.inner.lock_process() = Some(Arc::clone(&process));
        info!("Completion CLI started (pid {})", process.pid());

        self.warm_up(process).await
    }

    async fn warm_up(&self, process: Arc<ProcessHandle>) -> Result<()> {
        let generation = process.generation();
        let turn = Arc::clone(&self.inner.turn_lock).lock_owned().await;
        let (done_tx, mut done_rx) = oneshot::channel();

        let supervisor = self.clone();
        let warmup_process = Arc::clone(&process);
        tokio::spawn(async move {
            let _turn = turn;
            let outcome = supervisor
                .run_turn(
                    &warmup_process,
                    &supervisor.inner.config.warmup_prompt,
                    supervisor.inner.config.turn_timeout,
                )
                .await;
            // Send before leaving Busy so a grace expiry racing this task sees the result.
            let _ = done_tx.send(outcome);
            supervisor.transition(generation, ProviderState::Busy, ProviderState::Ready);
        });

        let grace = self.inner.config.warmup_grace;
        let outcome = tokio::select! {
            outcome = &mut done_rx => outcome.unwrap_or_else(|_| {
                Err(ProviderError::ProcessExited("warmup task ended".into()))
            }),
            _ = tokio::time::sleep(grace) => {
                info!(
                    "Warmup still running after {:?}, treating completion CLI as ready",
                    grace
                );
                // The warmup turn is still open, so the process is usable but busy.
                self.transition(generation, ProviderState::Starting, ProviderState::Busy);
                if !matches!(done_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                    self.transition(generation, ProviderState::Busy, ProviderState::Ready);
                }
                return Ok(());
            }
        };

        match outcome {
            Ok(reply) => {
                debug!("Warmup completed in {:?}", reply.latency);
            }
            Err(ProviderError::TurnFailed(reason)) => {
                warn!("Warmup turn reported an error, process is still usable: {}", reason);
            }
            Err(ProviderError::Timeout(after)) => {
                warn!("Warmup got no reply within {:?}, process is still running", after);
            }
            Err(e) => {
                warn!("Completion CLI failed during warmup: {}", e);
                process.kill();
                self.transition(generation, ProviderState::Starting, ProviderState::Stopped);
                return Err(e);
            }
        }

        self.transition(generation, ProviderState::Starting, ProviderState::Ready);
        Ok(())
    }

    async fn run_turn(
        &self,
        process: &ProcessHandle,
        text: &str,
        timeout: Duration,
    ) -> Result<TurnReply> {
        let line = codec::encode_user_turn(text)?;
        let deadline = tokio::time::Instant::now() + timeout;
        let (ticket, mut reply) = self.inner.correlator.open(process.generation())?;

        // An exit reaped before the turn opened cannot fail it.
        if process.has_exited() {
            return Err(ProviderError::ProcessExited(
                "completion CLI exited before the turn was sent".into(),
            ));
        }

        // The write and the reply share one deadline.
        if tokio::time::timeout_at(deadline, process.write_line(&line))
            .await
            .is_err()
        {
            // Stdin now holds a partial line, so the process cannot take another turn.
            warn!(
                "Completion CLI (pid {}) stopped reading stdin after {:?}, killing it",
                process.pid(),
                timeout
            );
            process.kill();
            return Err(ProviderError::Timeout(timeout));
        }

        match tokio::time::timeout_at(deadline, &mut reply).await {
            Ok(outcome) => outcome
                .unwrap_or_else(|_| Err(ProviderError::ProcessExited("turn dropped".into()))),
            Err(_) => {
                if self.inner.correlator.expire(ticket.id()) {
                    warn!("Turn {} timed out after {:?}", ticket.id(), timeout);
                    Err(ProviderError::Timeout(timeout))
                } else {
                    reply.await.unwrap_or_else(|_| {
                        Err(ProviderError::ProcessExited("turn dropped".into()))
                    })
                }
            }
        }
    }

    /// Move `from` to `to`, only while `generation` is the current process.
    fn transition(&self, generation: u64, from: ProviderState, to: ProviderState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == from && self.inner.is_current(generation) {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    fn live_process(&self) -> Option<Arc<ProcessHandle>> {
        self.inner
            .lock_process()
            .as_ref()
            .filter(|p| !p.has_exited())
            .cloned()
    }
}

/// Keeps the state `Busy` for the lifetime of one turn, including turns
/// whose caller is dropped mid-flight.
struct BusyGuard<'a> {
    supervisor: &'a ProcessSupervisor,
    generation: u64,
}

impl<'a> BusyGuard<'a> {
    fn enter(supervisor: &'a ProcessSupervisor, generation: u64) -> Self {
        supervisor.transition(generation, ProviderState::Ready, ProviderState::Busy);
        Self {
            supervisor,
            generation,
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.supervisor
            .transition(self.generation, ProviderState::Busy, ProviderState::Ready);
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn lock_process(&self) -> MutexGuard<'_, Option<Arc<ProcessHandle>>> {
        self.process
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_last_error(&self) -> MutexGuard<'_, Option<String>> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs on the exit watcher task after the child is reaped.
    fn handle_exit(inner: &Weak<Inner>, report: ExitReport) {
        let Some(inner) = inner.upgrade() else {
            return;
        };

        {
            let mut process = inner.lock_process();
            if process
                .as_ref()
                .is_some_and(|p| p.generation() == report.generation)
            {
                *process = None;
            }
        }

        if inner.is_current(report.generation) {
            inner.state.send_replace(ProviderState::Stopped);
        }
        inner
            .correlator
            .fail_process(report.generation, &report.description);

        if report.expected {
            info!(
                "Completion CLI (pid {}) exited: {}",
                report.pid, report.description
            );
        } else {
            warn!(
                "Completion CLI (pid {}) exited unexpectedly: {}",
                report.pid, report.description
            );
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::claude::shutdown::ShutdownPlan;
    use std::time::Instant;

    const HI_THERE: &str = r#"
while IFS= read -r line; do
  printf '%s\n' '{"type":"system","subtype":"init"}'
  printf '%s\n' '{"type":"assistant","message":{"content":[{"type":"text","text":"Hi "}]}}'
  printf '%s\n' '{"type":"assistant","message":{"content":[{"type":"text","text":"there"}]}}'
  printf '%s\n' '{"type":"result","result":""}'
done
"#;

    /// Replies `echo:<content>` in two fragments, with some stdout noise.
    const ECHO: &str = r#"
printf 'starting up\n'
while IFS= read -r line; do
  content=$(printf '%s' "$line" | sed -e 's/.*"content":"\(.*\)"}}$/\1/')
  printf '%s\n' '{"type":"assistant","message":{"content":[{"type":"text","text":"echo:"}]}}'
  sleep 0.02
  printf '{"type":"assistant","message":{"content":[{"type":"text","text":"%s"}]}}\n' "$content"
  printf '%s\n' '{"type":"result","result":"fallback"}'
done
"#;

    fn sh(script: &str) -> SubprocessConfig {
        SubprocessConfig::new("sh", vec!["-c".to_string(), script.to_string()])
            .with_turn_timeout(Duration::from_secs(5))
            .with_warmup_grace(Duration::from_secs(5))
            .with_shutdown(ShutdownPlan {
                grace: Duration::from_millis(500),
                hard_deadline: Duration::from_secs(3),
            })
    }

    #[tokio::test]
    async fn fragments_are_concatenated() {
        let supervisor = ProcessSupervisor::new(sh(HI_THERE));

        assert!(supervisor.initialize().await.unwrap());
        assert_eq!(supervisor.state(), ProviderState::Ready);
        assert!(supervisor.pid().is_some());

        let reply = supervisor.complete("hello").await.unwrap();
        assert_eq!(reply.text, "Hi there");
        assert_eq!(supervisor.state(), ProviderState::Ready);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn complete_starts_process_on_demand() {
        let supervisor = ProcessSupervisor::new(sh(ECHO));
        assert_eq!(supervisor.state(), ProviderState::Stopped);

        let reply = supervisor.complete("ping").await.unwrap();
        assert_eq!(reply.text, "echo:ping");
        assert_eq!(supervisor.state(), ProviderState::Ready);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completes_are_serialized() {
        let supervisor = ProcessSupervisor::new(sh(ECHO));
        supervisor.initialize().await.unwrap();

        let tasks: Vec<_> = (0..5)
            .map(|i| {
                let supervisor = supervisor.clone();
                tokio::spawn(async move {
                    let prompt = format!("req-{}", i);
                    let reply = supervisor.complete(&prompt).await;
                    (prompt, reply)
                })
            })
            .collect();

        for task in tasks {
            let (prompt, reply) = task.await.unwrap();
            assert_eq!(reply.unwrap().text, format!("echo:{}", prompt));
        }
        assert_eq!(supervisor.state(), ProviderState::Ready);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_initialize_spawns_once() {
        let script = r#"
while IFS= read -r line; do
  sleep 0.2
  printf '%s\n' '{"type":"result","result":"ready"}'
done
"#;
        let supervisor = ProcessSupervisor::new(sh(script));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let supervisor = supervisor.clone();
                tokio::spawn(async move { supervisor.initialize().await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }

        assert_eq!(supervisor.inner.generation.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state(), ProviderState::Ready);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_sets_error_state() {
        let supervisor = ProcessSupervisor::new(SubprocessConfig::new(
            "/nonexistent/memvault-test-cli",
            vec![],
        ));

        let err = supervisor.initialize().await.unwrap_err();
        assert!(matches!(err, ProviderError::Spawn(_)));
        assert_eq!(supervisor.state(), ProviderState::Error);
        assert_eq!(supervisor.pid(), None);

        // A failed start is retried on the next call.
        let err = supervisor.complete("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::Spawn(_)));
    }

    #[tokio::test]
    async fn turn_error_keeps_process_running() {
        let script = r#"
n=0
while IFS= read -r line; do
  n=$((n+1))
  if [ "$n" -eq 2 ]; then
    printf '%s\n' '{"type":"error","error":{"message":"rate limited"}}'
  else
    printf '%s\n' '{"type":"result","result":"ok"}'
  fi
done
"#;
        let supervisor = ProcessSupervisor::new(sh(script));
        supervisor.initialize().await.unwrap();
        let pid = supervisor.pid();

        let err = supervisor.complete("first").await.unwrap_err();
        assert!(matches!(err, ProviderError::TurnFailed(ref m) if m == "rate limited"));
        assert_eq!(supervisor.state(), ProviderState::Ready);

        let reply = supervisor.complete("second").await.unwrap();
        assert_eq!(reply.text, "ok");
        assert_eq!(supervisor.pid(), pid);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn timeout_keeps_process_running() {
        let script = r#"
n=0
while IFS= read -r line; do
  n=$((n+1))
  if [ "$n" -eq 2 ]; then
    sleep 0.5
    printf '%s\n' '{"type":"assistant","message":{"content":[{"type":"text","text":"too late"}]}}'
    printf '%s\n' '{"type":"result","result":"too late"}'
    continue
  fi
  printf '%s\n' '{"type":"result","result":"answered"}'
done
"#;
        let supervisor =
            ProcessSupervisor::new(sh(script).with_turn_timeout(Duration::from_millis(300)));
        supervisor.initialize().await.unwrap();
        let pid = supervisor.pid();

        let err = supervisor.complete("ignored").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert_eq!(supervisor.state(), ProviderState::Ready);
        assert!(!supervisor.inner.correlator.is_open());

        // Let the late reply arrive while no turn is open; it is discarded.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!supervisor.inner.correlator.is_open());
        assert_eq!(supervisor.pid(), pid);

        let reply = supervisor.complete("again").await.unwrap();
        assert_eq!(reply.text, "answered");
        assert_eq!(supervisor.pid(), pid);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stalled_stdin_write_is_bounded_by_turn_timeout() {
        let supervisor = ProcessSupervisor::new(
            sh("exec sleep 30")
                .with_warmup_grace(Duration::from_millis(100))
                .with_turn_timeout(Duration::from_millis(500)),
        );
        supervisor.initialize().await.unwrap();

        let prompt = "x".repeat(1 << 20);
        let started = Instant::now();
        let err = tokio::time::timeout(Duration::from_secs(5), supervisor.complete(&prompt))
            .await
            .expect("complete outlived its turn timeout")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));

        // A half-written line leaves the process unusable, so it is killed.
        let mut state = supervisor.watch_state();
        tokio::time::timeout(
            Duration::from_secs(3),
            state.wait_for(|s| *s == ProviderState::Stopped),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!supervisor.inner.correlator.is_open());
        assert_eq!(
            supervisor.shutdown().await.unwrap(),
            ShutdownOutcome::NotRunning
        );
    }

    #[tokio::test]
    async fn shutdown_escalates_past_a_stalled_stdin_write() {
        let script = r#"
read -r line
printf '%s\n' '{"type":"result","result":"ready"}'
exec sleep 30
"#;
        let supervisor = ProcessSupervisor::new(
            sh(script)
                .with_turn_timeout(Duration::from_secs(30))
                .with_shutdown(ShutdownPlan {
                    grace: Duration::from_millis(100),
                    hard_deadline: Duration::from_secs(1),
                }),
        );
        supervisor.initialize().await.unwrap();

        let pending = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.complete(&"x".repeat(1 << 20)).await })
        };
        let mut state = supervisor.watch_state();
        state
            .wait_for(|s| *s == ProviderState::Busy)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_secs(3), supervisor.shutdown())
            .await
            .expect("shutdown outlived its hard deadline")
            .unwrap();
        assert_eq!(outcome, ShutdownOutcome::Terminated);
        assert!(started.elapsed() < Duration::from_secs(2));

        let result = tokio::time::timeout(Duration::from_secs(3), pending)
            .await
            .expect("in-flight turn was not resolved")
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn crash_mid_turn_fails_turn_and_next_call_respawns() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("crashed");
        let script = format!(
            r#"
n=0
while IFS= read -r line; do
  n=$((n+1))
  if [ "$n" -ge 2 ] && [ ! -e "{marker}" ]; then
    : > "{marker}"
    exit 3
  fi
  printf '%s\n' '{{"type":"result","result":"alive"}}'
done
"#,
            marker = marker.display()
        );
        let supervisor = ProcessSupervisor::new(sh(&script));
        supervisor.initialize().await.unwrap();
        let first_pid = supervisor.pid().unwrap();

        let err = supervisor.complete("boom").await.unwrap_err();
        assert!(matches!(err, ProviderError::ProcessExited(_)));
        assert_eq!(supervisor.state(), ProviderState::Stopped);
        assert_eq!(supervisor.pid(), None);

        let reply = supervisor.complete("after crash").await.unwrap();
        assert_eq!(reply.text, "alive");
        let second_pid = supervisor.pid().unwrap();
        assert_ne!(first_pid, second_pid);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn exit_during_warmup_fails_initialize() {
        let supervisor = ProcessSupervisor::new(sh("read -r line; exit 1"));

        let err = supervisor.initialize().await.unwrap_err();
        assert!(matches!(err, ProviderError::ProcessExited(_)));
        assert_eq!(supervisor.state(), ProviderState::Stopped);
    }

    #[tokio::test]
    async fn warmup_error_still_reports_ready() {
        let script = r#"
while IFS= read -r line; do
  printf '%s\n' '{"type":"result","is_error":true,"result":"not logged in"}'
done
"#;
        let supervisor = ProcessSupervisor::new(sh(script));

        assert!(supervisor.initialize().await.unwrap());
        assert_eq!(supervisor.state(), ProviderState::Ready);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn slow_warmup_reports_busy_after_grace() {
        let script = r#"
n=0
while IFS= read -r line; do
  n=$((n+1))
  if [ "$n" -eq 1 ]; then
    continue
  fi
  printf '%s\n' '{"type":"result","result":"late-ok"}'
done
"#;
        let supervisor = ProcessSupervisor::new(
            sh(script)
                .with_warmup_grace(Duration::from_millis(200))
                .with_turn_timeout(Duration::from_secs(1)),
        );

        let started = Instant::now();
        assert!(supervisor.initialize().await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(supervisor.state(), ProviderState::Busy);
        assert!(supervisor.inner.correlator.is_open());

        // The first real turn queues behind the warmup until it times out.
        let reply = supervisor.complete("real").await.unwrap();
        assert_eq!(reply.text, "late-ok");
        assert_eq!(supervisor.state(), ProviderState::Ready);

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn slow_warmup_returns_to_ready_when_it_answers() {
        let script = r#"
while IFS= read -r line; do
  sleep 0.3
  printf '%s\n' '{"type":"result","result":"warm"}'
done
"#;
        let supervisor = ProcessSupervisor::new(
            sh(script).with_warmup_grace(Duration::from_millis(50)),
        );

        assert!(supervisor.initialize().await.unwrap());
        assert_eq!(supervisor.state(), ProviderState::Busy);

        let mut state = supervisor.watch_state();
        tokio::time::timeout(
            Duration::from_secs(3),
            state.wait_for(|s| *s == ProviderState::Ready),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!supervisor.inner.correlator.is_open());

        supervisor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_when_stdin_closes_is_graceful() {
        let supervisor = ProcessSupervisor::new(sh(HI_THERE));
        assert_eq!(
            supervisor.shutdown().await.unwrap(),
            ShutdownOutcome::NotRunning
        );

        supervisor.initialize().await.unwrap();
        assert_eq!(
            supervisor.shutdown().await.unwrap(),
            ShutdownOutcome::Graceful
        );
        assert_eq!(supervisor.state(), ProviderState::Stopped);
        assert_eq!(supervisor.pid(), None);

        assert_eq!(
            supervisor.shutdown().await.unwrap(),
            ShutdownOutcome::NotRunning
        );
    }

    #[tokio::test]
    async fn shutdown_escalates_to_terminate() {
        let script = format!("{}\nexec sleep 30\n", HI_THERE);
        let supervisor = ProcessSupervisor::new(sh(&script).with_shutdown(ShutdownPlan {
            grace: Duration::from_millis(100),
            hard_deadline: Duration::from_secs(3),
        }));
        supervisor.initialize().await.unwrap();

        assert_eq!(
            supervisor.shutdown().await.unwrap(),
            ShutdownOutcome::Terminated
        );
        assert_eq!(supervisor.state(), ProviderState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_kills_process_ignoring_terminate() {
        let script = format!("{}\ntrap '' TERM\nexec sleep 30\n", HI_THERE);
        let supervisor = ProcessSupervisor::new(sh(&script).with_shutdown(ShutdownPlan {
            grace: Duration::from_millis(50),
            hard_deadline: Duration::from_millis(300),
        }));
        supervisor.initialize().await.unwrap();

        let started = Instant::now();
        assert_eq!(
            supervisor.shutdown().await.unwrap(),
            ShutdownOutcome::Killed
        );
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(supervisor.state(), ProviderState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_fails_in_flight_turn() {
        let script = r#"
n=0
while IFS= read -r line; do
  n=$((n+1))
  if [ "$n" -eq 1 ]; then
    printf '%s\n' '{"type":"result","result":"ready"}'
  fi
done
trap '' TERM
exec sleep 30
"#;
        let supervisor = ProcessSupervisor::new(sh(script).with_shutdown(ShutdownPlan {
            grace: Duration::from_millis(50),
            hard_deadline: Duration::from_millis(200),
        }));
        supervisor.initialize().await.unwrap();

        let pending = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.complete("never answered").await })
        };
        let mut state = supervisor.watch_state();
        state
            .wait_for(|s| *s == ProviderState::Busy)
            .await
            .unwrap();

        assert_eq!(
            supervisor.shutdown().await.unwrap(),
            ShutdownOutcome::Killed
        );
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ProviderError::ProcessExited(_)));
    }

    #[tokio::test]
    async fn dropped_caller_does_not_leave_turn_open() {
        let script = r#"
n=0
while IFS= read -r line; do
  n=$((n+1))
  if [ "$n" -eq 2 ]; then
    continue
  fi
  printf '%s\n' '{"type":"result","result":"fresh"}'
done
"#;
        let supervisor = ProcessSupervisor::new(sh(script));
        supervisor.initialize().await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(200), supervisor.complete("slow")).await;
        assert!(abandoned.is_err());
        assert!(!supervisor.inner.correlator.is_open());
        assert_eq!(supervisor.state(), ProviderState::Ready);

        let reply = supervisor.complete("next").await.unwrap();
        assert_eq!(reply.text, "fresh");

        supervisor.shutdown().await.unwrap();
    }
}
