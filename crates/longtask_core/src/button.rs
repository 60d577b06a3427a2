//! Button controller
//!
//! Binds a clickable control to a [`TaskRunner`]: first click starts the
//! work, a click while running asks it to stop, and the label follows the
//! run state. The host UI plugs in through [`ButtonView`].

use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::runner::{Completion, RunId, RunnerConfig, RunnerError, TaskRunner};

/// Work executed on the background thread, shared across runs.
pub type WorkFn = Arc<dyn Fn(CancellationToken) -> anyhow::Result<()> + Send + Sync>;

/// Adapter implemented by the host UI.
///
/// All calls happen on the owning thread.
pub trait ButtonView {
    fn set_label(&mut self, label: &str);

    /// Called once per finished run, after the label is back to idle.
    fn task_finished(&mut self, _completion: &Completion) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonLabels {
    pub idle: String,
    pub running: String,
}

impl ButtonLabels {
    pub fn new(idle: impl Into<String>, running: impl Into<String>) -> Self {
        Self {
            idle: idle.into(),
            running: running.into(),
        }
    }
}

/// What a click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Started(RunId),
    StopRequested,
}

/// Controller for one task button.
///
/// Not `Send`: it belongs to the thread that dispatches clicks, and the
/// label is only ever changed there.
pub struct ButtonController<V: ButtonView> {
    labels: ButtonLabels,
    work: WorkFn,
    runner: TaskRunner,
    view: V,
    label: String,
    _owning_thread: PhantomData<Rc<()>>,
}

/// Build a controller with the default runner configuration.
pub fn new_task_button<V, F>(
    idle_label: impl Into<String>,
    running_label: impl Into<String>,
    work: F,
    view: V,
) -> ButtonController<V>
where
    V: ButtonView,
    F: Fn(CancellationToken) -> anyhow::Result<()> + Send + Sync + 'static,
{
    ButtonController::new(
        ButtonLabels::new(idle_label, running_label),
        Arc::new(work),
        view,
    )
}

impl<V: ButtonView> ButtonController<V> {
    pub fn new(labels: ButtonLabels, work: WorkFn, view: V) -> Self {
        Self::with_runner_config(labels, work, view, RunnerConfig::default())
    }

    pub fn with_runner_config(
        labels: ButtonLabels,
        work: WorkFn,
        mut view: V,
        config: RunnerConfig,
    ) -> Self {
        view.set_label(&labels.idle);
        Self {
            label: labels.idle.clone(),
            labels,
            work,
            runner: TaskRunner::new(config),
            view,
            _owning_thread: PhantomData,
        }
    }

    /// Handle a click: start when idle, request stop when running.
    pub fn on_click(&mut self) -> Result<ClickAction, RunnerError> {
        if self.runner.is_running() {
            self.runner.request_stop();
            return Ok(ClickAction::StopRequested);
        }

        let work = Arc::clone(&self.work);
        let run_id = self.runner.start(move |token| work(token))?;
        let running = self.labels.running.clone();
        self.set_label(&running);
        Ok(ClickAction::Started(run_id))
    }

    /// Drain a pending completion without blocking. Call from the event loop.
    pub fn tick(&mut self) -> Option<Completion> {
        let completion = self.runner.poll_completion()?;
        self.on_task_complete(&completion);
        Some(completion)
    }

    /// Block up to `timeout` for the in-flight run to finish.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> Option<Completion> {
        let completion = self.runner.wait_completion(timeout)?;
        self.on_task_complete(&completion);
        Some(completion)
    }

    /// Stop any in-flight run and join it. Call before the UI is torn down.
    ///
    /// No completion is delivered for a run stopped here.
    pub fn dispose(&mut self) -> Result<(), RunnerError> {
        debug!("Disposing button '{}'", self.labels.idle);
        self.runner.shutdown()
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    /// Label currently shown
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    fn on_task_complete(&mut self, completion: &Completion) {
        info!("Run {} finished ({}), resetting button", completion.run_id, completion.outcome);
        let idle = self.labels.idle.clone();
        self.set_label(&idle);
        self.view.task_finished(completion);
    }

    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
        self.view.set_label(label);
    }
}
