//! Headless mode: one click, an optional second click, wait for the outcome.

use anyhow::{Context, Result};
use longtask_core::{ButtonController, ButtonView, ClickAction, Completion};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How often the driver wakes up to check for a stop signal
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Prints label changes and outcomes as plain lines.
pub struct ConsoleView<W: Write> {
    out: W,
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn output(&self) -> &W {
        &self.out
    }
}

impl<W: Write> ButtonView for ConsoleView<W> {
    fn set_label(&mut self, label: &str) {
        if let Err(e) = writeln!(self.out, "[{}]", label) {
            warn!("Failed to print label '{}': {}", label, e);
        }
    }

    fn task_finished(&mut self, completion: &Completion) {
        let written = writeln!(
            self.out,
            "Run {} {} after {:.1}s",
            completion.run_id,
            completion.outcome,
            completion.elapsed.as_secs_f64()
        );
        if let Err(e) = written {
            warn!("Failed to print outcome of run {}: {}", completion.run_id, e);
        }
    }
}

/// Click once, then click again when `stop_signal` is raised or
/// `cancel_after` elapses. Returns the run's completion.
pub fn drive<V: ButtonView>(
    button: &mut ButtonController<V>,
    stop_signal: &AtomicBool,
    cancel_after: Option<Duration>,
) -> Result<Completion> {
    let action = button.on_click().context("Failed to start task")?;
    info!("Headless click: {:?}", action);

    let started = Instant::now();
    let mut stop_sent = false;
    loop {
        if let Some(completion) = button.wait_for_completion(POLL_INTERVAL) {
            return Ok(completion);
        }
        if stop_sent {
            continue;
        }

        let interrupted = stop_signal.load(Ordering::SeqCst);
        let expired = cancel_after.is_some_and(|after| started.elapsed() >= after);
        if interrupted || expired {
            info!(
                "Requesting stop ({})",
                if interrupted { "interrupted" } else { "cancel-after elapsed" }
            );
            let action = button.on_click().context("Failed to request stop")?;
            stop_sent = action == ClickAction::StopRequested;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use longtask_core::{new_task_button, CancellationToken};

    fn until_requested(token: CancellationToken) -> anyhow::Result<()> {
        while !token.is_requested() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    #[test]
    fn test_console_view_output() {
        let mut button =
            new_task_button("Go", "Stop", |_token| Ok(()), ConsoleView::new(Vec::new()));
        let never = AtomicBool::new(false);
        let completion = drive(&mut button, &never, None).unwrap();
        assert_eq!(completion.run_id, 1);

        let out = String::from_utf8(button.view().output().clone()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[..3], ["[Go]", "[Stop]", "[Go]"]);
        assert!(lines[3].starts_with("Run 1 completed after"));
    }

    /// Writer whose every write fails, like stdout after the reader hung up
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_errors_do_not_stop_the_run() {
        let mut button = new_task_button("Go", "Stop", |_token| Ok(()), ConsoleView::new(BrokenPipe));
        let completion = drive(&mut button, &AtomicBool::new(false), None).unwrap();
        assert_eq!(completion.outcome.as_str(), "completed");
        assert_eq!(button.label(), "Go");
        button.dispose().unwrap();
    }

    #[test]
    fn test_stop_signal_cancels() {
        let mut button = new_task_button("Go", "Stop", until_requested, ConsoleView::new(Vec::new()));
        let raised = AtomicBool::new(true);
        let completion = drive(&mut button, &raised, None).unwrap();
        assert_eq!(completion.outcome.as_str(), "cancelled early");
    }
}
