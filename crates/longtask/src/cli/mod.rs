//! Command-line surface of the launcher

pub mod tui;
