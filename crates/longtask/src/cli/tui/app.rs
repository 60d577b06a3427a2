//! TUI application state
//!
//! The terminal loop is the owning thread: key presses become clicks,
//! ticks drain completions, and the button label is rendered from
//! [`ButtonWidget`].

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use longtask_core::{ButtonController, ButtonView, ClickAction, Completion};
use tracing::{error, info};

use longtask::config::Settings;

/// Render state the controller writes into
#[derive(Debug, Default)]
pub struct ButtonWidget {
    pub label: String,
    /// (message, is_error) for the most recent finished run
    pub last_outcome: Option<(String, bool)>,
    pub finished_runs: u32,
}

impl ButtonView for ButtonWidget {
    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    fn task_finished(&mut self, completion: &Completion) {
        self.finished_runs += 1;
        self.last_outcome = Some((
            format!(
                "Run {} {} after {:.1}s",
                completion.run_id,
                completion.outcome,
                completion.elapsed.as_secs_f64()
            ),
            completion.outcome.is_failed(),
        ));
    }
}

pub struct App {
    /// Main loop keeps going while true
    pub running: bool,
    pub button: ButtonController<ButtonWidget>,
    /// (message, is_error)
    pub status_message: Option<(String, bool)>,
    pub tick_count: u64,
}

impl App {
    pub fn new(settings: &Settings) -> Self {
        let button = ButtonController::with_runner_config(
            settings.labels.clone(),
            settings.task.into_work(),
            ButtonWidget::default(),
            settings.runner_config(),
        );
        Self {
            running: true,
            button,
            status_message: None,
            tick_count: 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => self.click(),
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false
            }
            _ => {}
        }
    }

    pub fn click(&mut self) {
        self.status_message = match self.button.on_click() {
            Ok(ClickAction::Started(run_id)) => Some((format!("Run {} started", run_id), false)),
            Ok(ClickAction::StopRequested) => Some((
                "Stop requested, waiting for the task to finish".to_string(),
                false,
            )),
            Err(e) => {
                error!("Click failed: {}", e);
                Some((e.to_string(), true))
            }
        };
    }

    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        if self.button.tick().is_some() {
            self.status_message = None;
        }
    }

    /// Stop and join any in-flight run. Must run before the terminal is restored.
    pub fn shutdown(&mut self) -> Result<()> {
        info!("TUI exiting, disposing button");
        self.button.dispose().context("Failed to stop background task")
    }
}
