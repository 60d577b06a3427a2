//! Terminal User Interface for the long task button
//!
//! A single button on screen. Enter/Space clicks it, q/Esc quits.

pub mod app;
pub mod event;
pub mod ui;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, prelude::*, Terminal};
use std::io::stdout;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{error, warn};

use crate::cli::tui::app::App;
use crate::cli::tui::event::{Event, EventHandler};
use longtask::config::Settings;

/// Run the TUI
pub fn run(settings: &Settings) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut app = App::new(settings);

    // Create event handler
    let events = EventHandler::new(Duration::from_millis(100));

    let (result, shutdown) = with_panics_logged(|| {
        // Main loop
        let result = run_app(&mut terminal, &mut app, &events);

        // Join the worker before the UI goes away, on every exit path
        let shutdown = app.shutdown();
        (result, shutdown)
    });
    if let Err(e) = &shutdown {
        error!("{:#}", e);
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.and(shutdown)
}

/// Run `f` with panic reports going to the log file instead of the
/// alternate screen. The previous hook is restored afterwards.
///
/// A panicking worker already shows up as a failed run in the status line.
fn with_panics_logged<T>(f: impl FnOnce() -> T) -> T {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|info| {
        let current = std::thread::current();
        warn!("Thread '{}' {}", current.name().unwrap_or("<unnamed>"), info);
    }));

    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(previous);
    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Run the application loop
fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &EventHandler,
) -> Result<()> {
    while app.running {
        terminal.draw(|frame| ui::draw(frame, app))?;

        match events.next() {
            Event::Key(key) => app.handle_key(key),
            Event::Tick => app.tick(),
            Event::Resize(_, _) => {} // Ratatui handles resize
        }
    }

    Ok(())
}
