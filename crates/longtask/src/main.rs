//! Long Task Button launcher
//!
//! - `tui` (default): full-screen harness with a single task button
//! - `run`: headless, clicks once and waits; Ctrl-C requests a stop

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use longtask::config::{self, Settings, TaskArgs};
use longtask::headless::{self, ConsoleView};
use longtask_core::{ButtonController, TaskOutcome};
use longtask_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "longtask", version, about = "Run a long task behind a cancellable button")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (TOML). Defaults to ~/.longtask/config.toml when present
    #[arg(long, global = true, env = "LONGTASK_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    task: TaskArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui,

    /// Run the task without a UI
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Click the button again after this many milliseconds
    #[arg(long)]
    cancel_after_ms: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Console logs would corrupt the full-screen UI
    let is_tui_mode = !matches!(cli.command, Some(Commands::Run(_)));
    let _log_guard = match init_logging(LogConfig {
        app_name: "longtask",
        verbose: cli.verbose,
        tui_mode: is_tui_mode,
    }) {
        Ok(guard) => {
            if let Some(dir) = guard.log_dir() {
                info!("Logging to {}", dir.display());
            }
            Some(guard)
        }
        Err(e) => {
            eprintln!("Warning: {:#}", e);
            None
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let file = config::load_file_config(cli.config.as_deref())?;
    let settings = config::resolve(&cli.task, file.as_ref())?;
    info!(
        "Task: {} iterations x {:?}, shutdown grace {:?}",
        settings.task.iterations, settings.task.interval, settings.shutdown_grace
    );

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            cli::tui::run(&settings)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => {
            run_headless(&settings, args.cancel_after_ms.map(Duration::from_millis))
        }
    }
}

fn run_headless(settings: &Settings, cancel_after: Option<Duration>) -> Result<ExitCode> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let mut button = ButtonController::with_runner_config(
        settings.labels.clone(),
        settings.task.into_work(),
        ConsoleView::new(std::io::stdout()),
        settings.runner_config(),
    );

    let result = headless::drive(&mut button, &interrupted, cancel_after);
    // Joins the worker if drive() bailed out mid-run
    button.dispose()?;

    let completion = result?;
    Ok(match completion.outcome {
        TaskOutcome::Failed(_) => ExitCode::from(1),
        TaskOutcome::Completed | TaskOutcome::CancelledEarly => ExitCode::SUCCESS,
    })
}
