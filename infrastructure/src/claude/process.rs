//! Spawning the completion CLI and owning its pipes.
//!
//! [`launch`] starts the child and three background tasks:
//!
//! - a stdout reader feeding a [`LineBuffer`] and the [`TurnCorrelator`]
//! - a stderr forwarder that logs each line at debug level
//! - an exit watcher that owns the [`Child`], reaps it, and delivers signals
//!
//! The returned [`ProcessHandle`] is the only way to write to stdin or signal
//! the child. Dropping the last handle kills the child.

use super::codec::LineBuffer;
use super::config::SubprocessConfig;
use super::correlator::TurnCorrelator;
use super::error::{ProviderError, Result};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const READ_CHUNK: usize = 8192;

/// What the exit watcher observed.
#[derive(Debug, Clone)]
pub(crate) struct ExitReport {
    pub generation: u64,
    pub pid: u32,
    pub description: String,
    /// Whether a shutdown had been requested before the exit
    pub expected: bool,
}

#[derive(Debug, Clone, Copy)]
enum ProcessSignal {
    Terminate,
    Kill,
}

/// A live (or recently exited) completion CLI process.
pub(crate) struct ProcessHandle {
    pid: u32,
    generation: u64,
    stdin: Mutex<Option<BufWriter<ChildStdin>>>,
    signals: mpsc::UnboundedSender<ProcessSignal>,
    exited: CancellationToken,
    shutting_down: Arc<AtomicBool>,
}

impl ProcessHandle {
    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.exited.is_cancelled()
    }

    /// Resolves once the child has been reaped.
    pub(crate) async fn wait_exit(&self) {
        self.exited.cancelled().await;
    }

    /// Write one protocol line and flush it.
    pub(crate) async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        let Some(writer) = stdin.as_mut() else {
            return Err(ProviderError::ProcessExited("stdin already closed".into()));
        };

        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        written.map_err(|e| ProviderError::ProcessExited(format!("write to stdin failed: {}", e)))
    }

    /// Close stdin, signalling end of session.
    pub(crate) async fn close_stdin(&self) {
        if let Some(mut writer) = self.stdin.lock().await.take() {
            let _ = writer.shutdown().await;
            trace!("Closed stdin of completion CLI (pid {})", self.pid);
        }
    }

    /// Mark the coming exit as requested.
    pub(crate) fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Ask the process to terminate. Returns `false` if it already exited.
    pub(crate) fn terminate(&self) -> bool {
        !self.has_exited() && self.signals.send(ProcessSignal::Terminate).is_ok()
    }

    /// Kill the process. Returns `false` if it already exited.
    pub(crate) fn kill(&self) -> bool {
        !self.has_exited() && self.signals.send(ProcessSignal::Kill).is_ok()
    }
}

/// Spawn the CLI described by `config` and start its background tasks.
///
/// `on_exit` runs once on the watcher task after the child is reaped and the
/// handle reports [`has_exited`](ProcessHandle::has_exited).
pub(crate) fn launch<F>(
    config: &SubprocessConfig,
    generation: u64,
    correlator: Arc<TurnCorrelator>,
    on_exit: F,
) -> Result<Arc<ProcessHandle>>
where
    F: FnOnce(ExitReport) + Send + 'static,
{
    let args = config.command_args();
    debug!("Spawning completion CLI: {} {}", config.command, args.join(" "));

    let mut cmd = Command::new(&config.command);
    cmd.args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Linux: request kernel to send SIGTERM to child when parent dies.
    // This catches cases where Drop doesn't run (SIGKILL, OOM kill).
    #[cfg(target_os = "linux")]
    unsafe {
        cmd.pre_exec(|| {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
            Ok(())
        });
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| ProviderError::Spawn(format!("{}: {}", config.command, e)))?;

    let pid = child
        .id()
        .ok_or_else(|| ProviderError::Spawn("process exited before it could be tracked".into()))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ProviderError::Spawn("failed to capture stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ProviderError::Spawn("failed to capture stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ProviderError::Spawn("failed to capture stderr".into()))?;

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let exited = CancellationToken::new();
    let shutting_down = Arc::new(AtomicBool::new(false));

    tokio::spawn(read_stdout(stdout, generation, correlator));
    tokio::spawn(forward_stderr(stderr, pid));
    tokio::spawn(watch_exit(
        child,
        signal_rx,
        exited.clone(),
        Arc::clone(&shutting_down),
        move |description, expected| {
            on_exit(ExitReport {
                generation,
                pid,
                description,
                expected,
            })
        },
    ));

    Ok(Arc::new(ProcessHandle {
        pid,
        generation,
        stdin: Mutex::new(Some(BufWriter::new(stdin))),
        signals: signal_tx,
        exited,
        shutting_down,
    }))
}

/// Single owner of stdout. Ends at EOF or on a read error.
async fn read_stdout(mut stdout: ChildStdout, generation: u64, correlator: Arc<TurnCorrelator>) {
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for message in buffer.push(&chunk[..n]) {
                    correlator.dispatch(generation, message);
                }
            }
            Err(e) => {
                warn!("Reading completion CLI stdout failed: {}", e);
                break;
            }
        }
    }

    if !buffer.remainder().is_empty() {
        debug!(
            "Completion CLI stdout closed with {} bytes of unterminated output",
            buffer.remainder().len()
        );
    }
    trace!("Stdout reader for generation {} finished", generation);
}

async fn forward_stderr(stderr: ChildStderr, pid: u32) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!("[cli {}] {}", pid, line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Reading completion CLI stderr failed: {}", e);
                break;
            }
        }
    }
}

enum WatchEvent {
    Exited(std::io::Result<ExitStatus>),
    Signal(Option<ProcessSignal>),
}

async fn watch_exit<F>(
    mut child: Child,
    mut signals: mpsc::UnboundedReceiver<ProcessSignal>,
    exited: CancellationToken,
    shutting_down: Arc<AtomicBool>,
    on_exit: F,
) where
    F: FnOnce(String, bool),
{
    let mut signals_open = true;

    let status = loop {
        let event = if signals_open {
            tokio::select! {
                status = child.wait() => WatchEvent::Exited(status),
                signal = signals.recv() => WatchEvent::Signal(signal),
            }
        } else {
            WatchEvent::Exited(child.wait().await)
        };

        match event {
            WatchEvent::Exited(status) => break status,
            WatchEvent::Signal(Some(ProcessSignal::Terminate)) => request_termination(&child),
            WatchEvent::Signal(Some(ProcessSignal::Kill)) => {
                let _ = child.start_kill();
            }
            WatchEvent::Signal(None) => {
                // Every handle is gone; nobody can talk to this process again.
                signals_open = false;
                let _ = child.start_kill();
            }
        }
    };

    let description = match status {
        Ok(status) => status.to_string(),
        Err(e) => format!("failed to wait for process: {}", e),
    };

    exited.cancel();
    on_exit(description, shutting_down.load(Ordering::SeqCst));
}

#[cfg(unix)]
fn request_termination(child: &Child) {
    // `id()` is None once the child has been reaped, so the pid cannot have
    // been reused.
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn request_termination(_child: &Child) {}
