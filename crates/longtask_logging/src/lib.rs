//! Shared logging setup for Long Task binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "longtask=info,longtask_core=info";

/// Logging configuration shared by Long Task binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Full-screen UI owns the terminal; only errors go to stderr.
    pub tui_mode: bool,
}

/// Keeps the non-blocking file writer alive. Hold it until exit.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LogGuard {
    /// Directory the log file is written to, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Initialize tracing with a daily log file and stderr output.
///
/// A missing or unwritable log directory downgrades to console-only logging.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = EnvFilter::new(console_directive(&config, &file_filter.to_string()));

    let mut file_guard = None;
    let mut log_dir = None;
    let file_layer = match ensure_logs_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, log_file_name(config.app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            log_dir = Some(dir);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_names(true)
                    .with_filter(file_filter),
            )
        }
        Err(err) => {
            eprintln!("Warning: file logging disabled: {:#}", err);
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard {
        _file_guard: file_guard,
        log_dir,
    })
}

/// Get the Long Task home directory: ~/.longtask
pub fn longtask_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("LONGTASK_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".longtask")
}

/// Get the logs directory: ~/.longtask/logs
pub fn logs_dir() -> PathBuf {
    longtask_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    create_logs_dir(logs_dir())
}

fn create_logs_dir(logs: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn console_directive(config: &LogConfig<'_>, file_directive: &str) -> String {
    if config.tui_mode {
        "error".to_string()
    } else if config.verbose {
        file_directive.to_string()
    } else {
        "warn".to_string()
    }
}

fn log_file_name(app_name: &str) -> String {
    format!("{}.log", sanitize_name(app_name))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(verbose: bool, tui_mode: bool) -> LogConfig<'static> {
        LogConfig {
            app_name: "longtask",
            verbose,
            tui_mode,
        }
    }

    #[test]
    fn test_log_file_name_is_sanitized() {
        assert_eq!(log_file_name("longtask"), "longtask.log");
        assert_eq!(log_file_name("long task/ui"), "long_task_ui.log");
    }

    #[test]
    fn test_console_directive() {
        assert_eq!(console_directive(&config(false, true), DEFAULT_LOG_FILTER), "error");
        assert_eq!(console_directive(&config(true, true), DEFAULT_LOG_FILTER), "error");
        assert_eq!(
            console_directive(&config(true, false), DEFAULT_LOG_FILTER),
            DEFAULT_LOG_FILTER
        );
        assert_eq!(console_directive(&config(false, false), DEFAULT_LOG_FILTER), "warn");
    }

    #[test]
    fn test_logs_dir_under_home() {
        assert!(logs_dir().starts_with(longtask_home()));
        assert!(logs_dir().ends_with("logs"));
    }

    #[test]
    fn test_ensure_logs_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let logs = create_logs_dir(tmp.path().join("logs")).unwrap();
        assert_eq!(logs, tmp.path().join("logs"));
        assert!(logs.is_dir());

        // Idempotent
        create_logs_dir(tmp.path().join("logs")).unwrap();
    }

    #[test]
    fn test_ensure_logs_dir_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        fs::write(&blocker, "file").unwrap();

        let err = create_logs_dir(blocker.join("logs")).unwrap_err();
        assert!(err.to_string().contains("Failed to create logs directory"));
    }
}
