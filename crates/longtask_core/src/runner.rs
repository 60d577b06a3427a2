//! Single-flight background task runner
//!
//! Design principles:
//! - At most one worker thread per runner; start() while running is rejected
//! - Every run gets a fresh CancellationToken, tokens are never reused
//! - Completion travels over a per-run channel and is drained by the owning thread
//! - shutdown() requests stop and joins the worker before returning
//! - Panics and errors inside work are resolved at the thread boundary

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced synchronously by the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// start() was called while a run is in flight. Nothing was spawned.
    #[error("Illegal state: run {run_id} is still in flight")]
    IllegalState { run_id: RunId },

    /// The worker ignored the stop request for longer than the grace period.
    /// By the time this is returned the worker has exited.
    #[error("Shutdown exceeded grace period of {grace:?} (worker exited after {waited:?})")]
    ShutdownTimeout { grace: Duration, waited: Duration },

    /// The OS refused to create the worker thread
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The runner has been shut down and accepts no more work
    #[error("Runner is shut down")]
    Closed,
}

impl RunnerError {
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, RunnerError::IllegalState { .. })
    }
}

/// Why a run ended in failure.
#[derive(Debug, Error)]
pub enum WorkFailure {
    /// Work returned Err
    #[error("Work returned an error: {0:#}")]
    Returned(anyhow::Error),

    /// Work panicked; the payload message is kept when it is a string
    #[error("Work panicked: {0}")]
    Panicked(String),

    /// Worker thread went away without posting an outcome
    #[error("Worker thread exited without reporting an outcome")]
    Lost,
}

// ============================================================================
// Run Types
// ============================================================================

/// Identifier of one start() call, unique per runner. Starts at 1.
pub type RunId = u64;

/// Grace period shutdown() waits before escalating.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run state as seen by the owning thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// How a run ended.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Work returned Ok without seeing a stop request
    Completed,
    /// Work saw the stop request and returned Ok
    CancelledEarly,
    /// Work returned an error, panicked, or vanished
    Failed(WorkFailure),
}

impl TaskOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::CancelledEarly => "cancelled early",
            TaskOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Failed(failure) => write!(f, "failed: {}", failure),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Completion notification, delivered exactly once per run.
#[derive(Debug)]
pub struct Completion {
    pub run_id: RunId,
    pub outcome: TaskOutcome,
    /// Time from spawn until work returned
    pub elapsed: Duration,
}

/// Runner configuration (plain data)
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Used for worker thread names and log lines
    pub name: String,
    pub shutdown_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "longtask".to_string(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

struct ActiveRun {
    run_id: RunId,
    token: CancellationToken,
    handle: JoinHandle<()>,
    completion_rx: mpsc::Receiver<Completion>,
    started: Instant,
}

// ============================================================================
// TaskRunner
// ============================================================================

/// Runs one piece of work at a time on a dedicated thread.
///
/// The runner lives on the owning thread. The worker only touches its own
/// token clone and the sending half of the completion channel; the owning
/// thread drains the receiving half through [`TaskRunner::poll_completion`]
/// or [`TaskRunner::wait_completion`].
pub struct TaskRunner {
    config: RunnerConfig,
    active: Option<ActiveRun>,
    last_run_id: RunId,
    closed: bool,
}

impl TaskRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            active: None,
            last_run_id: 0,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> RunState {
        if self.active.is_some() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Id of the run currently in flight
    pub fn active_run_id(&self) -> Option<RunId> {
        self.active.as_ref().map(|active| active.run_id)
    }

    /// Spawn `work` on a new worker thread.
    ///
    /// Fails with [`RunnerError::IllegalState`] while a run is in flight and
    /// with [`RunnerError::Closed`] after shutdown; neither has side effects.
    pub fn start<F>(&mut self, work: F) -> Result<RunId, RunnerError>
    where
        F: FnOnce(CancellationToken) -> anyhow::Result<()> + Send + 'static,
    {
        if self.closed {
            warn!("{}: start rejected, runner is shut down", self.config.name);
            return Err(RunnerError::Closed);
        }
        if let Some(active) = &self.active {
            warn!(
                "{}: start rejected, run {} still in flight",
                self.config.name, active.run_id
            );
            return Err(RunnerError::IllegalState {
                run_id: active.run_id,
            });
        }

        let run_id = self.last_run_id + 1;
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let (completion_tx, completion_rx) = mpsc::sync_channel(1);
        let started = Instant::now();

        let handle = thread::Builder::new()
            .name(format!("{}-run-{}", self.config.name, run_id))
            .spawn(move || {
                let outcome = execute_work(work, worker_token);
                let completion = Completion {
                    run_id,
                    outcome,
                    elapsed: started.elapsed(),
                };
                // Receiver is gone only after shutdown, which discards the outcome anyway
                let _ = completion_tx.send(completion);
            })
            .map_err(|e| {
                error!("{}: failed to spawn run {}: {}", self.config.name, run_id, e);
                RunnerError::Spawn(e)
            })?;

        self.last_run_id = run_id;
        self.active = Some(ActiveRun {
            run_id,
            token,
            handle,
            completion_rx,
            started,
        });
        info!("{}: run {} started", self.config.name, run_id);
        Ok(run_id)
    }

    /// Ask the in-flight run to stop. Returns false (and does nothing) when idle.
    ///
    /// Never blocks. The run stays Running until its completion is drained.
    pub fn request_stop(&self) -> bool {
        match &self.active {
            Some(active) => {
                active.token.request();
                info!("{}: stop requested for run {}", self.config.name, active.run_id);
                true
            }
            None => {
                debug!("{}: stop requested while idle, ignoring", self.config.name);
                false
            }
        }
    }

    /// Non-blocking check for the in-flight run's completion.
    ///
    /// Call from the owning thread's event loop. Returns the completion at
    /// most once per run, after which the runner is Idle.
    pub fn poll_completion(&mut self) -> Option<Completion> {
        let active = self.active.as_ref()?;
        match active.completion_rx.try_recv() {
            Ok(completion) => Some(self.finish(completion)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                let completion = lost_completion(active);
                Some(self.finish(completion))
            }
        }
    }

    /// Block the owning thread for up to `timeout` waiting for the in-flight run.
    ///
    /// Returns None when idle or when the timeout elapses first.
    pub fn wait_completion(&mut self, timeout: Duration) -> Option<Completion> {
        let active = self.active.as_ref()?;
        match active.completion_rx.recv_timeout(timeout) {
            Ok(completion) => Some(self.finish(completion)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                let completion = lost_completion(active);
                Some(self.finish(completion))
            }
        }
    }

    /// Request stop and block until the worker thread has exited.
    ///
    /// The completion of a run stopped here is discarded, never delivered.
    /// The runner is closed afterwards. When the worker outlives the grace
    /// period the join still completes and [`RunnerError::ShutdownTimeout`]
    /// is returned.
    pub fn shutdown(&mut self) -> Result<(), RunnerError> {
        self.closed = true;
        let Some(active) = self.active.take() else {
            debug!("{}: shutdown with no run in flight", self.config.name);
            return Ok(());
        };

        let run_id = active.run_id;
        let grace = self.config.shutdown_grace;
        info!("{}: shutting down, stopping run {}", self.config.name, run_id);
        active.token.request();

        let wait_start = Instant::now();
        let timed_out = match active.completion_rx.recv_timeout(grace) {
            Ok(completion) => {
                debug!(
                    "{}: discarding completion of run {} ({})",
                    self.config.name, run_id, completion.outcome
                );
                false
            }
            Err(RecvTimeoutError::Disconnected) => false,
            Err(RecvTimeoutError::Timeout) => {
                error!(
                    "{}: run {} ignored stop request for {:?}, still waiting for it to exit",
                    self.config.name, run_id, grace
                );
                true
            }
        };

        if active.handle.join().is_err() {
            warn!("{}: worker for run {} panicked during shutdown", self.config.name, run_id);
        }
        let waited = wait_start.elapsed();

        if timed_out {
            error!(
                "{}: run {} exited {:?} after shutdown began (grace {:?})",
                self.config.name, run_id, waited, grace
            );
            return Err(RunnerError::ShutdownTimeout { grace, waited });
        }

        info!("{}: run {} joined after {:?}", self.config.name, run_id, waited);
        Ok(())
    }

    fn finish(&mut self, completion: Completion) -> Completion {
        if let Some(active) = self.active.take() {
            // The worker sends as its last act, so this join is short
            if active.handle.join().is_err() {
                warn!("{}: worker for run {} panicked after reporting", self.config.name, active.run_id);
            }
        }

        match &completion.outcome {
            TaskOutcome::Failed(failure) => warn!(
                "{}: run {} failed after {:?}: {}",
                self.config.name, completion.run_id, completion.elapsed, failure
            ),
            outcome => info!(
                "{}: run {} {} after {:?}",
                self.config.name, completion.run_id, outcome, completion.elapsed
            ),
        }
        completion
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        if let Some(run_id) = self.active_run_id() {
            warn!(
                "{}: dropped with run {} in flight, shutting down",
                self.config.name, run_id
            );
            if let Err(e) = self.shutdown() {
                error!("{}: shutdown on drop failed: {}", self.config.name, e);
            }
        }
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("active_run_id", &self.active_run_id())
            .field("closed", &self.closed)
            .finish()
    }
}

// --- Helper functions ---

/// Run work on the current thread and classify how it ended.
fn execute_work<F>(work: F, token: CancellationToken) -> TaskOutcome
where
    F: FnOnce(CancellationToken) -> anyhow::Result<()>,
{
    let probe = token.clone();
    match panic::catch_unwind(AssertUnwindSafe(move || work(token))) {
        Ok(Ok(())) if probe.was_observed() => TaskOutcome::CancelledEarly,
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(e)) => TaskOutcome::Failed(WorkFailure::Returned(e)),
        Err(payload) => TaskOutcome::Failed(WorkFailure::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lost_completion(active: &ActiveRun) -> Completion {
    Completion {
        run_id: active.run_id,
        outcome: TaskOutcome::Failed(WorkFailure::Lost),
        elapsed: active.started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_work_completed() {
        let outcome = execute_work(|_token| Ok(()), CancellationToken::new());
        assert!(matches!(outcome, TaskOutcome::Completed));
    }

    #[test]
    fn test_execute_work_unobserved_request_is_completed() {
        let token = CancellationToken::new();
        token.request();
        let outcome = execute_work(|_token| Ok(()), token);
        assert!(matches!(outcome, TaskOutcome::Completed));
    }

    #[test]
    fn test_execute_work_observed_request_is_cancelled_early() {
        let token = CancellationToken::new();
        token.request();
        let outcome = execute_work(
            |token| {
                assert!(token.is_requested());
                Ok(())
            },
            token,
        );
        assert!(matches!(outcome, TaskOutcome::CancelledEarly));
    }

    #[test]
    fn test_execute_work_error_is_failed() {
        let outcome = execute_work(
            |_token| Err(anyhow::anyhow!("disk full")),
            CancellationToken::new(),
        );
        match outcome {
            TaskOutcome::Failed(WorkFailure::Returned(e)) => {
                assert!(e.to_string().contains("disk full"))
            }
            other => panic!("expected returned failure, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_work_panic_is_failed() {
        let outcome = execute_work(
            |_token| -> anyhow::Result<()> { panic!("boom at {}", 3) },
            CancellationToken::new(),
        );
        match outcome {
            TaskOutcome::Failed(WorkFailure::Panicked(msg)) => assert_eq!(msg, "boom at 3"),
            other => panic!("expected panic failure, got {:?}", other),
        }
    }

    #[test]
    fn test_panic_message_non_string_payload() {
        assert_eq!(panic_message(Box::new(42u32)), "unknown panic");
        assert_eq!(panic_message(Box::new("static")), "static");
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(TaskOutcome::Completed.to_string(), "completed");
        assert_eq!(TaskOutcome::CancelledEarly.to_string(), "cancelled early");
        let failed = TaskOutcome::Failed(WorkFailure::Panicked("oops".to_string()));
        assert_eq!(failed.to_string(), "failed: Work panicked: oops");
        assert!(failed.is_failed());
    }

    #[test]
    fn test_runner_error_variants() {
        let illegal = RunnerError::IllegalState { run_id: 7 };
        assert!(illegal.is_illegal_state());
        assert!(illegal.to_string().contains("run 7"));
        assert!(!RunnerError::Closed.is_illegal_state());
    }

    #[test]
    fn test_new_runner_is_idle() {
        let runner = TaskRunner::new(RunnerConfig::default());
        assert_eq!(runner.state(), RunState::Idle);
        assert!(!runner.is_running());
        assert!(!runner.is_closed());
        assert_eq!(runner.active_run_id(), None);
        assert_eq!(runner.name(), "longtask");
    }

    #[test]
    fn test_poll_and_wait_when_idle_return_none() {
        let mut runner = TaskRunner::new(RunnerConfig::default());
        assert!(runner.poll_completion().is_none());
        assert!(runner.wait_completion(Duration::from_millis(10)).is_none());
    }
}
