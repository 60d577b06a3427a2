//! Long Task Button - launcher library
//!
//! Configuration, demo work and the headless driver shared by the
//! `longtask` binary and its tests.

pub mod config;
pub mod demo;
pub mod headless;

pub use config::{resolve, FileConfig, Settings, TaskArgs};
pub use demo::DemoTask;
