//! Demo work for the harness: a fixed number of iterations, checking for a
//! stop request before each one.

use anyhow::bail;
use longtask_core::{CancellationToken, WorkFn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Upper bound on how long the demo sleeps without looking at the token
const POLL_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoTask {
    pub iterations: u32,
    pub interval: Duration,
    /// Iteration (1-based) at which the task returns an error
    pub fail_at: Option<u32>,
}

impl Default for DemoTask {
    fn default() -> Self {
        Self {
            iterations: 10,
            interval: Duration::from_secs(1),
            fail_at: None,
        }
    }
}

impl DemoTask {
    pub fn run(&self, token: &CancellationToken) -> anyhow::Result<()> {
        let total = self.iterations;
        for i in 1..=total {
            if token.is_requested() {
                info!("Task cancelled early at iteration {}/{}", i, total);
                return Ok(());
            }
            if self.fail_at == Some(i) {
                bail!("Demo task failed at iteration {}/{}", i, total);
            }
            info!("Working... iteration {}/{}", i, total);
            if sleep_unless_requested(token, self.interval) {
                info!("Task cancelled early during iteration {}/{}", i, total);
                return Ok(());
            }
        }
        info!("Task completed successfully");
        Ok(())
    }

    pub fn into_work(self) -> WorkFn {
        Arc::new(move |token: CancellationToken| self.run(&token))
    }
}

/// Sleep for `duration`, waking early once a stop is requested.
/// Returns true when the sleep was cut short.
fn sleep_unless_requested(token: &CancellationToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if token.is_requested() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(POLL_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(iterations: u32) -> DemoTask {
        DemoTask {
            iterations,
            interval: Duration::from_millis(1),
            fail_at: None,
        }
    }

    #[test]
    fn test_runs_all_iterations() {
        let token = CancellationToken::new();
        quick(5).run(&token).unwrap();
        assert!(!token.was_observed());
    }

    #[test]
    fn test_zero_iterations_completes() {
        quick(0).run(&CancellationToken::new()).unwrap();
    }

    #[test]
    fn test_stops_before_first_iteration_when_requested() {
        let token = CancellationToken::new();
        token.request();
        let task = DemoTask {
            iterations: 3,
            interval: Duration::from_secs(10),
            fail_at: None,
        };

        let started = Instant::now();
        task.run(&token).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(token.was_observed());
    }

    #[test]
    fn test_fail_at_returns_error() {
        let task = DemoTask {
            fail_at: Some(2),
            ..quick(4)
        };
        let err = task.run(&CancellationToken::new()).unwrap_err();
        assert_eq!(err.to_string(), "Demo task failed at iteration 2/4");
    }

    #[test]
    fn test_sleep_wakes_on_request() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.request();
        });

        let started = Instant::now();
        assert!(sleep_unless_requested(&token, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(2));
        stopper.join().unwrap();
    }

    #[test]
    fn test_sleep_runs_out_without_request() {
        let token = CancellationToken::new();
        assert!(!sleep_unless_requested(&token, Duration::from_millis(10)));
        assert!(!token.was_observed());
    }

    #[test]
    fn test_stop_during_last_iteration_ends_run_as_cancelled() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.request();
        });

        let task = DemoTask {
            iterations: 1,
            interval: Duration::from_secs(10),
            fail_at: None,
        };
        let started = Instant::now();
        task.run(&token).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(token.was_observed());
        stopper.join().unwrap();
    }
}
