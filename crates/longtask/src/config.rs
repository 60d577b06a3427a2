//! Configuration for the launcher
//!
//! Precedence: command-line flag > `LONGTASK_*` environment variable >
//! config file (`--config`, or ~/.longtask/config.toml when present) >
//! built-in defaults.

use anyhow::{bail, Context, Result};
use clap::Args;
use longtask_core::{ButtonLabels, RunnerConfig, DEFAULT_SHUTDOWN_GRACE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::demo::DemoTask;

pub const DEFAULT_IDLE_LABEL: &str = "Start Task";
pub const DEFAULT_RUNNING_LABEL: &str = "Task Running - Click to Cancel";

/// Task and button options shared by all subcommands
#[derive(Debug, Clone, Default, Args)]
pub struct TaskArgs {
    /// Button text while idle
    #[arg(long, global = true, env = "LONGTASK_IDLE_LABEL")]
    pub idle_label: Option<String>,

    /// Button text while the task runs
    #[arg(long, global = true, env = "LONGTASK_RUNNING_LABEL")]
    pub running_label: Option<String>,

    /// Number of demo iterations
    #[arg(long, global = true, env = "LONGTASK_ITERATIONS")]
    pub iterations: Option<u32>,

    /// Time per iteration in milliseconds
    #[arg(long, global = true, env = "LONGTASK_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    /// Make the demo fail at this iteration (1-based)
    #[arg(long, global = true, env = "LONGTASK_FAIL_AT")]
    pub fail_at: Option<u32>,

    /// How long shutdown waits for the task to stop before reporting a timeout
    #[arg(long, global = true, env = "LONGTASK_SHUTDOWN_GRACE_MS")]
    pub shutdown_grace_ms: Option<u64>,
}

/// On-disk configuration (TOML)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub button: ButtonSection,
    pub task: TaskSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ButtonSection {
    pub idle_label: Option<String>,
    pub running_label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskSection {
    pub iterations: Option<u32>,
    pub interval_ms: Option<u64>,
    pub fail_at: Option<u32>,
    pub shutdown_grace_ms: Option<u64>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub labels: ButtonLabels,
    pub task: DemoTask,
    pub shutdown_grace: Duration,
}

impl Settings {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            name: "longtask".to_string(),
            shutdown_grace: self.shutdown_grace,
        }
    }
}

/// Default config file location: ~/.longtask/config.toml
pub fn default_config_path() -> PathBuf {
    longtask_logging::longtask_home().join("config.toml")
}

/// Load the config file: an explicit path must exist, the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    match explicit {
        Some(path) => FileConfig::load(path).map(Some),
        None => {
            let path = default_config_path();
            if path.is_file() {
                FileConfig::load(&path).map(Some)
            } else {
                Ok(None)
            }
        }
    }
}

/// Merge flags over the config file over defaults, then validate.
pub fn resolve(args: &TaskArgs, file: Option<&FileConfig>) -> Result<Settings> {
    let empty = FileConfig::default();
    let file = file.unwrap_or(&empty);
    let defaults = DemoTask::default();

    let idle = args
        .idle_label
        .clone()
        .or_else(|| file.button.idle_label.clone())
        .unwrap_or_else(|| DEFAULT_IDLE_LABEL.to_string());
    let running = args
        .running_label
        .clone()
        .or_else(|| file.button.running_label.clone())
        .unwrap_or_else(|| DEFAULT_RUNNING_LABEL.to_string());

    let iterations = args
        .iterations
        .or(file.task.iterations)
        .unwrap_or(defaults.iterations);
    let interval = args
        .interval_ms
        .or(file.task.interval_ms)
        .map(Duration::from_millis)
        .unwrap_or(defaults.interval);
    let fail_at = args.fail_at.or(file.task.fail_at);
    let shutdown_grace = args
        .shutdown_grace_ms
        .or(file.task.shutdown_grace_ms)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_SHUTDOWN_GRACE);

    if idle.trim().is_empty() || running.trim().is_empty() {
        bail!("Button labels must not be empty");
    }
    if let Some(at) = fail_at {
        if at == 0 || at > iterations {
            bail!("fail_at must be between 1 and {} (got {})", iterations, at);
        }
    }

    Ok(Settings {
        labels: ButtonLabels::new(idle, running),
        task: DemoTask {
            iterations,
            interval,
            fail_at,
        },
        shutdown_grace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = resolve(&TaskArgs::default(), None).unwrap();
        assert_eq!(settings.labels.idle, DEFAULT_IDLE_LABEL);
        assert_eq!(settings.labels.running, DEFAULT_RUNNING_LABEL);
        assert_eq!(settings.task, DemoTask::default());
        assert_eq!(settings.shutdown_grace, DEFAULT_SHUTDOWN_GRACE);
    }

    #[test]
    fn test_file_overrides_defaults_and_flags_override_file() {
        let file = FileConfig::parse(
            r#"
            [button]
            idle_label = "Go"
            running_label = "Stop"

            [task]
            iterations = 3
            interval_ms = 250
            "#,
        )
        .unwrap();

        let args = TaskArgs {
            running_label: Some("Halt".to_string()),
            iterations: Some(5),
            ..TaskArgs::default()
        };
        let settings = resolve(&args, Some(&file)).unwrap();

        assert_eq!(settings.labels, ButtonLabels::new("Go", "Halt"));
        assert_eq!(settings.task.iterations, 5);
        assert_eq!(settings.task.interval, Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = FileConfig::parse("[task]\nretries = 3\n").unwrap_err();
        assert!(format!("{:#}", err).contains("retries"));
    }

    #[test]
    fn test_fail_at_out_of_range_rejected() {
        let args = TaskArgs {
            iterations: Some(3),
            fail_at: Some(4),
            ..TaskArgs::default()
        };
        assert!(resolve(&args, None).is_err());

        let args = TaskArgs {
            fail_at: Some(0),
            ..TaskArgs::default()
        };
        assert!(resolve(&args, None).is_err());
    }

    #[test]
    fn test_empty_label_rejected() {
        let args = TaskArgs {
            idle_label: Some("  ".to_string()),
            ..TaskArgs::default()
        };
        assert!(resolve(&args, None).is_err());
    }

    #[test]
    fn test_runner_config_uses_grace() {
        let args = TaskArgs {
            shutdown_grace_ms: Some(1500),
            ..TaskArgs::default()
        };
        let settings = resolve(&args, None).unwrap();
        assert_eq!(
            settings.runner_config().shutdown_grace,
            Duration::from_millis(1500)
        );
    }
}
