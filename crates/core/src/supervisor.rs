// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-flight supervisor for the external benchmark workload.
//!
//! [`RunSupervisor`] is a cheap, cloneable handle over one shared state value.
//! Every transition (start, stop request, completion) goes through the same
//! mutex, so concurrent `start` calls have exactly one winner.
//!
//! After a successful spawn the child process is moved into a dedicated
//! waiter task, which is the only owner of the handle. `stop` never touches
//! the child directly: it cancels the run's token and waits for the waiter to
//! report how the process went down.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SupervisorError};
use crate::run::{
    RunAccepted, RunConfig, RunId, RunOutcome, RunState, RunStatus, StateTransition, StopKind,
};

/// Time allowed between the termination signal and a forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Maximum bytes kept from each of stdout and stderr.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How long to wait for the output pipes to drain once the process is gone.
const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK_BYTES: usize = 8 * 1024;

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

const MSG_INITIALIZING: &str = "Initializing benchmark...";
const MSG_RUNNING: &str = "Benchmark running...";
const MSG_STOPPING: &str = "Stopping benchmark...";
const MSG_COMPLETED: &str = "Benchmark completed successfully";

/// How the supervisor launches the workload.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Executable to launch.
    pub program: String,
    /// Arguments placed before the per-run arguments.
    pub base_args: Vec<String>,
    /// Orchestration root; the child's working directory.
    pub workspace_dir: PathBuf,
    /// Grace period between the termination signal and a forced kill.
    pub grace_period: Duration,
    /// Per-stream cap on captured output.
    pub max_output_bytes: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            base_args: ["run", "--bin", "benchmarks", "--"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            workspace_dir: PathBuf::from(".."),
            grace_period: DEFAULT_GRACE_PERIOD,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl SupervisorConfig {
    /// Default launch settings rooted at `workspace_dir`.
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            ..Self::default()
        }
    }

    /// Replace the program and its leading arguments.
    pub fn with_program<I, S>(mut self, program: impl Into<String>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.base_args = base_args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the graceful-stop grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set the per-stream output cap.
    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Full command line for a run, program first.
    pub fn command_line(&self, config: &RunConfig) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.base_args.iter().cloned())
            .chain(config.to_args())
            .collect()
    }
}

struct ActiveRun {
    run_id: RunId,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    stopped: Option<oneshot::Receiver<StopKind>>,
}

struct SupervisorState {
    state: RunState,
    message: String,
    active: Option<ActiveRun>,
    last_outcome: Option<RunOutcome>,
    events: broadcast::Sender<StateTransition>,
}

impl SupervisorState {
    fn transition(&mut self, run_id: &str, to: RunState, message: impl Into<String>) {
        let from = self.state;
        self.state = to;
        self.message = message.into();

        info!(
            run_id,
            from = %from,
            to = %to,
            message = %self.message,
            "Run state transition"
        );

        // No subscribers is fine.
        let _ = self.events.send(StateTransition {
            run_id: run_id.to_string(),
            from,
            to,
            message: self.message.clone(),
            at: Utc::now(),
        });
    }

    fn snapshot(&self) -> RunStatus {
        RunStatus {
            running: self.state != RunState::Idle,
            message: self.message.clone(),
            state: self.state,
            run_id: self.active.as_ref().map(|a| a.run_id.clone()),
            pid: self.active.as_ref().and_then(|a| a.pid),
            started_at: self.active.as_ref().map(|a| a.started_at),
            last_outcome: self.last_outcome.clone(),
        }
    }
}

/// Handle to the process-wide run supervisor.
#[derive(Clone)]
pub struct RunSupervisor {
    config: Arc<SupervisorConfig>,
    state: Arc<Mutex<SupervisorState>>,
    events: broadcast::Sender<StateTransition>,
}

impl RunSupervisor {
    /// Create an idle supervisor.
    pub fn new(config: SupervisorConfig) -> Self {
        let (events, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        let state = SupervisorState {
            state: RunState::Idle,
            message: String::new(),
            active: None,
            last_outcome: None,
            events: events.clone(),
        };

        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(state)),
            events,
        }
    }

    /// Launch settings in use.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Subscribe to state transitions published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateTransition> {
        self.events.subscribe()
    }

    /// Current status snapshot.
    pub async fn status(&self) -> RunStatus {
        self.state.lock().await.snapshot()
    }

    /// Launch a run and return without waiting for it.
    ///
    /// # Errors
    ///
    /// - [`SupervisorError::InvalidConfig`] if `config` fails validation.
    /// - [`SupervisorError::AlreadyRunning`] unless the supervisor is idle.
    /// - [`SupervisorError::SpawnFailed`] if the workload cannot be launched;
    ///   the supervisor is back to idle when this is returned.
    pub async fn start(&self, config: RunConfig) -> Result<RunAccepted> {
        config.validate()?;

        let mut state = self.state.lock().await;
        if state.state != RunState::Idle {
            return Err(SupervisorError::AlreadyRunning);
        }

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        state.transition(&run_id, RunState::Running, MSG_INITIALIZING);

        let command_line = self.config.command_line(&config);
        info!(
            run_id = %run_id,
            command = %command_line.join(" "),
            workspace_dir = %self.config.workspace_dir.display(),
            "Launching benchmark"
        );

        let child = match spawn_workload(&self.config, &config) {
            Ok(child) => child,
            Err(source) => {
                warn!(run_id = %run_id, error = %source, "Failed to launch benchmark");
                let message = format!("Benchmark error: {source}");
                let finished_at = Utc::now();
                state.last_outcome = Some(RunOutcome {
                    run_id: run_id.clone(),
                    state: RunState::Failed,
                    exit_code: None,
                    message: message.clone(),
                    stop: None,
                    stdout: String::new(),
                    stderr: source.to_string(),
                    started_at,
                    finished_at,
                    duration_ms: elapsed_ms(started_at, finished_at),
                });
                state.transition(&run_id, RunState::Failed, message.clone());
                state.transition(&run_id, RunState::Idle, message);
                metrics::counter!("benchdash_runs_finished_total", "outcome" => "spawn_failed")
                    .increment(1);

                return Err(SupervisorError::SpawnFailed {
                    program: self.config.program.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        let cancel = CancellationToken::new();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        state.active = Some(ActiveRun {
            run_id: run_id.clone(),
            pid,
            started_at,
            cancel: cancel.clone(),
            stopped: Some(stopped_rx),
        });
        state.message = MSG_RUNNING.to_string();
        metrics::counter!("benchdash_runs_started_total").increment(1);

        tokio::spawn(supervise(
            Arc::clone(&self.state),
            Arc::clone(&self.config),
            run_id.clone(),
            started_at,
            child,
            cancel,
            stopped_tx,
        ));

        Ok(RunAccepted {
            run_id,
            pid,
            command: command_line,
            config,
        })
    }

    /// Stop the active run.
    ///
    /// Sends a termination request, waits up to the grace period and then
    /// kills the process. Resolves once the supervisor is idle again.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::NotRunning`] when there is no running run, including
    /// when another stop request is already in progress.
    pub async fn stop(&self) -> Result<StopKind> {
        let stopped = {
            let mut state = self.state.lock().await;
            if state.state != RunState::Running {
                return Err(SupervisorError::NotRunning);
            }
            let Some(active) = state.active.as_mut() else {
                return Err(SupervisorError::NotRunning);
            };
            let Some(stopped) = active.stopped.take() else {
                return Err(SupervisorError::NotRunning);
            };
            active.cancel.cancel();
            let run_id = active.run_id.clone();
            state.transition(&run_id, RunState::Cancelled, MSG_STOPPING);
            stopped
        };

        stopped.await.map_err(|_| SupervisorError::NotRunning)
    }
}

fn spawn_workload(launch: &SupervisorConfig, config: &RunConfig) -> std::io::Result<Child> {
    // The working directory is set on the child only; the service's own
    // current directory is never changed.
    Command::new(&launch.program)
        .args(&launch.base_args)
        .args(config.to_args())
        .current_dir(&launch.workspace_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Waiter task: owns the child until it exits, then records the outcome.
async fn supervise(
    shared: Arc<Mutex<SupervisorState>>,
    launch: Arc<SupervisorConfig>,
    run_id: RunId,
    started_at: DateTime<Utc>,
    mut child: Child,
    cancel: CancellationToken,
    stopped_tx: oneshot::Sender<StopKind>,
) {
    let stdout_capture = child
        .stdout
        .take()
        .map(|out| spawn_capture(out, "stdout", &run_id, launch.max_output_bytes));
    let stderr_capture = child
        .stderr
        .take()
        .map(|err| spawn_capture(err, "stderr", &run_id, launch.max_output_bytes));

    let (exit, stop) = tokio::select! {
        status = child.wait() => (status, None),
        () = cancel.cancelled() => {
            let (status, kind) = terminate(&mut child, launch.grace_period, &run_id).await;
            (status, Some(kind))
        }
    };

    // A grandchild that inherited a pipe can keep it open after the workload
    // exits, so both streams share one drain deadline.
    let (stdout, stderr) = tokio::join!(
        collect_output(stdout_capture, "stdout", &run_id),
        collect_output(stderr_capture, "stderr", &run_id),
    );
    let exit_code = exit.as_ref().ok().and_then(ExitStatus::code);

    let (terminal, stop, duration_ms) = {
        let mut state = shared.lock().await;
        if state.active.as_ref().map(|a| a.run_id.as_str()) != Some(run_id.as_str()) {
            warn!(run_id = %run_id, "Finished run is no longer the active run; discarding outcome");
            return;
        }

        // `stop` cancels under this lock, so a request that raced with a
        // natural exit is visible here and still gets an answer.
        let stop = stop.or_else(|| cancel.is_cancelled().then_some(StopKind::Graceful));
        let (terminal, message) = classify(stop, &exit);
        let finished_at = Utc::now();
        let duration_ms = elapsed_ms(started_at, finished_at);

        state.last_outcome = Some(RunOutcome {
            run_id: run_id.clone(),
            state: terminal,
            exit_code,
            message: message.clone(),
            stop,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms,
        });
        state.transition(&run_id, terminal, message.clone());
        state.active = None;
        state.transition(&run_id, RunState::Idle, message);
        (terminal, stop, duration_ms)
    };

    metrics::counter!("benchdash_runs_finished_total", "outcome" => terminal.as_str()).increment(1);
    metrics::histogram!("benchdash_run_duration_seconds").record(duration_ms as f64 / 1000.0);

    if let Some(kind) = stop {
        let _ = stopped_tx.send(kind);
    }
}

fn classify(stop: Option<StopKind>, exit: &std::io::Result<ExitStatus>) -> (RunState, String) {
    match (stop, exit) {
        (Some(kind), _) => (RunState::Cancelled, kind.message().to_string()),
        (None, Ok(status)) if status.success() => (RunState::Completed, MSG_COMPLETED.to_string()),
        (None, Ok(status)) => match status.code() {
            Some(code) => (RunState::Failed, format!("Benchmark failed with code {code}")),
            None => (RunState::Failed, "Benchmark terminated by signal".to_string()),
        },
        (None, Err(err)) => (RunState::Failed, format!("Benchmark error: {err}")),
    }
}

/// Ask the child to exit, escalating to a kill after `grace_period`.
async fn terminate(
    child: &mut Child,
    grace_period: Duration,
    run_id: &str,
) -> (std::io::Result<ExitStatus>, StopKind) {
    info!(run_id, grace_ms = grace_period.as_millis() as u64, "Requesting benchmark shutdown");
    if let Err(err) = request_exit(child) {
        warn!(run_id, error = %err, "Failed to signal benchmark process");
    }

    match timeout(grace_period, child.wait()).await {
        Ok(status) => (status, StopKind::Graceful),
        Err(_) => {
            warn!(
                run_id,
                error = %SupervisorError::StopTimeout { grace_period },
                "Escalating to forced termination"
            );
            if let Err(err) = child.kill().await {
                warn!(run_id, error = %err, "Failed to kill benchmark process");
            }
            (child.wait().await, StopKind::Forced)
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn request_exit(child: &mut Child) -> std::io::Result<()> {
    // No pid means the child has already been reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to
    // a child we have not yet reaped.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

/// Text captured from one child pipe, readable after the reader is gone.
type CapturedText = Arc<std::sync::Mutex<String>>;

/// Pipe reader task together with the text it has captured so far.
type OutputCapture = (JoinHandle<std::io::Result<()>>, CapturedText);

/// Splits a child pipe into lines for the log and keeps a bounded prefix.
///
/// Whole lines are kept until the first one that does not fit under
/// `max_bytes`; nothing after it is kept, but the pipe is still drained so
/// the child never blocks on a full pipe.
struct LineCapture {
    stream: &'static str,
    run_id: RunId,
    max_bytes: usize,
    captured: CapturedText,
    line: Vec<u8>,
    line_overflow: bool,
    truncated: bool,
}

impl LineCapture {
    fn new(stream: &'static str, run_id: RunId, max_bytes: usize, captured: CapturedText) -> Self {
        Self {
            stream,
            run_id,
            max_bytes,
            captured,
            line: Vec::with_capacity(256),
            line_overflow: false,
            truncated: false,
        }
    }

    fn extend(&mut self, mut bytes: &[u8]) {
        while let Some(end) = bytes.iter().position(|&b| b == b'\n') {
            self.buffer(&bytes[..=end]);
            self.end_line();
            bytes = &bytes[end + 1..];
        }
        self.buffer(bytes);
    }

    /// Add to the pending line without letting it grow past `max_bytes`.
    fn buffer(&mut self, bytes: &[u8]) {
        let room = self.max_bytes.saturating_sub(self.line.len());
        if bytes.len() > room {
            self.line.extend_from_slice(&bytes[..room]);
            self.line_overflow = true;
        } else {
            self.line.extend_from_slice(bytes);
        }
    }

    fn end_line(&mut self) {
        let text = String::from_utf8_lossy(&self.line);
        debug!(run_id = %self.run_id, stream = self.stream, "{}", text.trim_end());

        if !self.truncated {
            let mut captured = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
            if self.line_overflow || captured.len() + text.len() > self.max_bytes {
                warn!(
                    run_id = %self.run_id,
                    stream = self.stream,
                    max_bytes = self.max_bytes,
                    "Output exceeded limit, truncating"
                );
                self.truncated = true;
            } else {
                captured.push_str(&text);
            }
        }

        self.line.clear();
        self.line_overflow = false;
    }

    fn finish(mut self) {
        if !self.line.is_empty() || self.line_overflow {
            self.end_line();
        }
    }
}

/// Drain a child pipe in fixed-size chunks into `capture`.
async fn capture_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    mut capture: LineCapture,
) -> std::io::Result<()> {
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        capture.extend(&chunk[..read]);
    }
    capture.finish();
    Ok(())
}

fn spawn_capture<R>(
    reader: R,
    stream: &'static str,
    run_id: &str,
    max_bytes: usize,
) -> OutputCapture
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let captured = CapturedText::default();
    let capture = LineCapture::new(stream, run_id.to_string(), max_bytes, Arc::clone(&captured));
    (tokio::spawn(capture_stream(reader, capture)), captured)
}

/// Wait for a pipe reader to finish and return what it captured.
///
/// A reader still running after [`IO_CAPTURE_TIMEOUT`] is aborted; the output
/// read up to that point is kept.
async fn collect_output(
    capture: Option<OutputCapture>,
    stream: &'static str,
    run_id: &str,
) -> String {
    let Some((mut task, captured)) = capture else {
        return String::new();
    };

    match timeout(IO_CAPTURE_TIMEOUT, &mut task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => {
            warn!(run_id, stream, error = %err, "Output capture failed");
        }
        Ok(Err(err)) => {
            warn!(run_id, stream, error = %err, "Output capture task panicked");
        }
        Err(_) => {
            warn!(run_id, stream, "Output capture timed out; keeping partial output");
            task.abort();
        }
    }

    let mut captured = captured.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *captured)
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    end.signed_duration_since(start)
        .num_milliseconds()
        .unsigned_abs()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn supervisor(dir: &Path, script: &str) -> RunSupervisor {
        RunSupervisor::new(
            SupervisorConfig::new(dir)
                .with_program("sh", ["-c", script, "benchmarks"])
                .with_grace_period(Duration::from_millis(500)),
        )
    }

    fn run_config() -> RunConfig {
        RunConfig::builder()
            .scenario("single-client")
            .num_clients(2)
            .num_rounds(1)
            .build()
            .unwrap()
    }

    async fn until_idle(rx: &mut broadcast::Receiver<StateTransition>) -> Vec<StateTransition> {
        let mut seen = Vec::new();
        loop {
            let transition = timeout(Duration::from_secs(15), rx.recv())
                .await
                .expect("timed out waiting for transition")
                .expect("transition channel closed");
            let done = transition.to == RunState::Idle;
            seen.push(transition);
            if done {
                return seen;
            }
        }
    }

    fn states(transitions: &[StateTransition]) -> Vec<RunState> {
        transitions.iter().map(|t| t.to).collect()
    }

    #[tokio::test]
    async fn test_successful_run_transitions_through_completed() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "echo hello from bench; exit 0");
        let mut rx = sup.subscribe();

        let accepted = sup.start(run_config()).await.unwrap();
        let transitions = until_idle(&mut rx).await;

        assert_eq!(
            states(&transitions),
            vec![RunState::Running, RunState::Completed, RunState::Idle]
        );
        assert!(transitions.iter().all(|t| t.run_id == accepted.run_id));

        let status = sup.status().await;
        assert!(!status.running);
        assert_eq!(status.state, RunState::Idle);
        assert!(status.message.contains("successfully"));
        assert!(status.run_id.is_none());

        let outcome = status.last_outcome.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stdout.contains("hello from bench"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_transitions_through_failed() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "echo broken >&2; exit 3");
        let mut rx = sup.subscribe();

        sup.start(run_config()).await.unwrap();
        let transitions = until_idle(&mut rx).await;

        assert_eq!(
            states(&transitions),
            vec![RunState::Running, RunState::Failed, RunState::Idle]
        );

        let status = sup.status().await;
        assert!(status.message.contains('3'));
        let outcome = status.last_outcome.unwrap();
        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(outcome.stderr.contains("broken"));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "sleep 30");

        let first = sup.start(run_config()).await.unwrap();
        let second = sup.start(run_config()).await;
        assert!(matches!(second, Err(SupervisorError::AlreadyRunning)));

        let status = sup.status().await;
        assert!(status.running);
        assert_eq!(status.run_id.as_deref(), Some(first.run_id.as_str()));
        assert_eq!(status.pid, first.pid);

        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_starts_have_one_winner() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "sleep 30");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sup = sup.clone();
                tokio::spawn(async move { sup.start(run_config()).await })
            })
            .collect();

        let mut accepted = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(SupervisorError::AlreadyRunning) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(rejected, 7);

        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_rejected() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "exit 0");

        let before = sup.status().await;
        let result = sup.stop().await;
        assert!(matches!(result, Err(SupervisorError::NotRunning)));

        let after = sup.status().await;
        assert_eq!(after.state, RunState::Idle);
        assert_eq!(after.message, before.message);
        assert!(after.last_outcome.is_none());
    }

    #[tokio::test]
    async fn test_graceful_stop() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "sleep 30");
        let mut rx = sup.subscribe();

        sup.start(run_config()).await.unwrap();
        let kind = sup.stop().await.unwrap();
        assert_eq!(kind, StopKind::Graceful);

        let transitions = until_idle(&mut rx).await;
        assert_eq!(
            states(&transitions),
            vec![
                RunState::Running,
                RunState::Cancelled,
                RunState::Cancelled,
                RunState::Idle
            ]
        );

        let status = sup.status().await;
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.message, "Benchmark stopped by user");
        let outcome = status.last_outcome.unwrap();
        assert_eq!(outcome.state, RunState::Cancelled);
        assert_eq!(outcome.stop, Some(StopKind::Graceful));
    }

    #[tokio::test]
    async fn test_stop_escalates_when_term_is_ignored() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "trap '' TERM; echo ready; while :; do :; done");

        sup.start(run_config()).await.unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let kind = sup.stop().await.unwrap();
        assert_eq!(kind, StopKind::Forced);

        let status = sup.status().await;
        assert!(!status.running);
        assert_eq!(status.message, "Benchmark forcefully terminated");
        assert_eq!(
            status.last_outcome.unwrap().stop,
            Some(StopKind::Forced)
        );
    }

    #[tokio::test]
    async fn test_second_stop_is_rejected_while_stopping() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "trap '' TERM; while :; do :; done");

        sup.start(run_config()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let first = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.stop().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(sup.stop().await, Err(SupervisorError::NotRunning)));
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_spawn_failure_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        let sup = RunSupervisor::new(
            SupervisorConfig::new(dir.path())
                .with_program("/nonexistent/benchdash-workload", Vec::<String>::new()),
        );
        let mut rx = sup.subscribe();

        let result = sup.start(run_config()).await;
        assert!(matches!(result, Err(SupervisorError::SpawnFailed { .. })));

        let transitions = until_idle(&mut rx).await;
        assert_eq!(
            states(&transitions),
            vec![RunState::Running, RunState::Failed, RunState::Idle]
        );

        let status = sup.status().await;
        assert!(!status.running);
        assert!(status.message.starts_with("Benchmark error"));
        assert_eq!(status.last_outcome.unwrap().state, RunState::Failed);

        // The supervisor accepts new work afterwards.
        assert!(matches!(
            sup.start(run_config()).await,
            Err(SupervisorError::SpawnFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_without_transition() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "exit 0");
        let mut config = run_config();
        config.num_clients = 0;

        let result = sup.start(config).await;
        assert!(matches!(result, Err(SupervisorError::InvalidConfig(_))));
        assert_eq!(sup.status().await.state, RunState::Idle);
        assert!(sup.subscribe().try_recv().is_err());
    }

    #[tokio::test]
    async fn test_arguments_and_working_directory_are_applied() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "pwd; echo \"$@\"");
        let mut rx = sup.subscribe();
        let cwd_before = std::env::current_dir().unwrap();

        let config = RunConfig::builder()
            .scenario("my-experimental-mode")
            .num_clients(3)
            .num_rounds(2)
            .client_delay_ms(10)
            .max_concurrent(3)
            .server_url("http://127.0.0.1:9000")
            .build()
            .unwrap();
        let accepted = sup.start(config).await.unwrap();
        assert_eq!(accepted.command[0], "sh");
        until_idle(&mut rx).await;

        let outcome = sup.status().await.last_outcome.unwrap();
        let mut lines = outcome.stdout.lines();
        let pwd = PathBuf::from(lines.next().unwrap());
        assert_eq!(pwd.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
        assert_eq!(
            lines.next().unwrap(),
            "--scenario my-experimental-mode --num-clients 3 --rounds 2 \
             --client-delay-ms 10 --max-concurrent 3 --server-url http://127.0.0.1:9000 --verbose"
        );
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    fn bounded_supervisor(dir: &Path, script: &str, max_output_bytes: usize) -> RunSupervisor {
        RunSupervisor::new(
            SupervisorConfig::new(dir)
                .with_program("sh", ["-c", script, "benchmarks"])
                .with_max_output_bytes(max_output_bytes),
        )
    }

    #[tokio::test]
    async fn test_output_is_bounded() {
        let dir = TempDir::new().unwrap();
        let script = "for i in 1 2 3 4 5 6 7 8 9 10; do echo line-$i; done";
        let sup = bounded_supervisor(dir.path(), script, 21);
        let mut rx = sup.subscribe();

        sup.start(run_config()).await.unwrap();
        until_idle(&mut rx).await;

        let outcome = sup.status().await.last_outcome.unwrap();
        assert_eq!(outcome.stdout, "line-1\nline-2\nline-3\n");
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_nothing_is_kept_after_truncation() {
        let dir = TempDir::new().unwrap();
        let script = "echo aaaa; echo bbbbbbbbbbbbbbbbbbbb; echo cc";
        let sup = bounded_supervisor(dir.path(), script, 10);
        let mut rx = sup.subscribe();

        sup.start(run_config()).await.unwrap();
        until_idle(&mut rx).await;

        let outcome = sup.status().await.last_outcome.unwrap();
        assert_eq!(outcome.stdout, "aaaa\n");
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_long_line_without_newline_is_dropped() {
        let dir = TempDir::new().unwrap();
        let script = "echo ok; yes x | head -c 100000 | tr -d '\\n'; echo; echo after";
        let sup = bounded_supervisor(dir.path(), script, 1024);
        let mut rx = sup.subscribe();

        sup.start(run_config()).await.unwrap();
        until_idle(&mut rx).await;

        let outcome = sup.status().await.last_outcome.unwrap();
        assert_eq!(outcome.stdout, "ok\n");
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_output_survives_inherited_pipe() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(dir.path(), "echo important; sleep 20 & exit 0");
        let mut rx = sup.subscribe();

        let started = std::time::Instant::now();
        sup.start(run_config()).await.unwrap();
        until_idle(&mut rx).await;
        let elapsed = started.elapsed();

        let outcome = sup.status().await.last_outcome.unwrap();
        assert_eq!(outcome.state, RunState::Completed);
        assert!(outcome.stdout.contains("important"));
        assert!(elapsed < Duration::from_secs(8), "took {elapsed:?}");
    }
}
