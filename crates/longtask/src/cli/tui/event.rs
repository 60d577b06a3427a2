//! Event handling for the TUI

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;

/// Application events
#[derive(Debug)]
pub enum Event {
    /// Key press
    Key(KeyEvent),
    /// Periodic tick
    Tick,
    /// Terminal resize
    Resize(u16, u16),
}

/// Event handler
pub struct EventHandler {
    /// Tick rate
    tick_rate: Duration,
}

impl EventHandler {
    /// Create new event handler with given tick rate
    pub fn new(tick_rate: Duration) -> Self {
        Self { tick_rate }
    }

    /// Get next event, blocking at most one tick
    pub fn next(&self) -> Event {
        if !event::poll(self.tick_rate).unwrap_or(false) {
            return Event::Tick;
        }
        match event::read() {
            Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
            Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
            _ => Event::Tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handler_creation() {
        let handler = EventHandler::new(Duration::from_millis(100));
        assert_eq!(handler.tick_rate, Duration::from_millis(100));
    }
}
