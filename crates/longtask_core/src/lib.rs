//! Long Task Button - Core Library
//!
//! A cancellable background-task primitive bound to a single button:
//! clicking starts work off the UI thread, clicking again asks it to stop,
//! and the label tracks whether work is in flight.
//!
//! - [`CancellationToken`]: monotonic, thread-safe "stop requested" flag
//! - [`TaskRunner`]: one worker thread at a time, completion drained by the owning thread
//! - [`ButtonController`]: click/label binding with explicit teardown

pub mod button;
pub mod cancel;
pub mod runner;

pub use button::{new_task_button, ButtonController, ButtonLabels, ButtonView, ClickAction, WorkFn};
pub use cancel::CancellationToken;
pub use runner::{
    Completion, RunId, RunState, RunnerConfig, RunnerError, TaskOutcome, TaskRunner, WorkFailure,
    DEFAULT_SHUTDOWN_GRACE,
};
