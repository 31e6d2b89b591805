//! Recovery progress front-end
//!
//! Connects to the update engine, shows update progress on the console and
//! optionally installs a local update file.
//!
//! Usage:
//!   recovery-progress [--config <path>] [--install <file> [--dry-run]] [--export-logs]
//!                     [--log-dir <dir>]
//!
//! The process will:
//! 1. Open the progress channel (fatal on failure)
//! 2. Start the update monitor thread (fatal on failure)
//! 3. Start the local update, if one was requested
//! 4. Drain progress records into the display on every tick

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

use recovery_progress::config::{RecoveryConfig, DEFAULT_CONFIG_PATH};
use recovery_progress::core::error::{Classify, ErrorClass};
use recovery_progress::dispatcher::{ConsoleDisplay, ProgressDispatcher};
use recovery_progress::engine::socket::SocketEngine;
use recovery_progress::engine::UpdateEngine;
use recovery_progress::initiator::UpdateInitiator;
use recovery_progress::logging::{LogLevel, LogOutput, LoggingSystem};
use recovery_progress::monitor::{MonitorError, UpdateMonitor};
use recovery_progress::notification::export_log;
use recovery_progress::{RecoveryContext, RecoveryError};

/// Command line arguments
struct Args {
    /// Configuration file
    config: PathBuf,
    /// Local update file to install
    install: Option<PathBuf>,
    /// Ask the engine to validate the update without installing it
    dry_run: bool,
    /// Export the notification log to removable media after each update
    export_logs: bool,
    /// Enable verbose logging
    verbose: bool,
    /// Also write log files into this directory
    log_dir: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let mut config = PathBuf::from(DEFAULT_CONFIG_PATH);
        let mut install = None;
        let mut dry_run = false;
        let mut export_logs = false;
        let mut verbose = false;
        let mut log_dir = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from).ok_or("--config needs a path")?;
                }
                "--install" | "-i" => {
                    install = Some(args.next().map(PathBuf::from).ok_or("--install needs a file")?);
                }
                "--dry-run" | "-n" => {
                    dry_run = true;
                }
                "--export-logs" | "-x" => {
                    export_logs = true;
                }
                "--verbose" | "-v" => {
                    verbose = true;
                }
                "--log-dir" | "-l" => {
                    log_dir = Some(args.next().map(PathBuf::from).ok_or("--log-dir needs a directory")?);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    return Err(format!("Unknown argument: {}", arg));
                }
            }
        }

        if dry_run && install.is_none() {
            return Err("--dry-run requires --install".to_string());
        }

        Ok(Self {
            config,
            install,
            dry_run,
            export_logs,
            verbose,
            log_dir,
        })
    }
}

fn print_help() {
    println!(
        r#"recovery-progress - Update progress display

USAGE:
    recovery-progress [OPTIONS]

OPTIONS:
    -c, --config <PATH>     Configuration file (default: /etc/recovery_gui/config.json)
    -i, --install <FILE>    Install a local update file
    -n, --dry-run           Validate the update file without installing it
    -x, --export-logs       Export the notification log to removable media
                            when an update finishes
    -v, --verbose           Enable verbose logging
    -l, --log-dir <DIR>     Also write log files into DIR
    -h, --help              Print this help message

DESCRIPTION:
    Follows the update engine's progress and notification streams and shows
    them on the console. With --install the process exits once the update
    finishes, with status 0 on success and 1 on failure. Without it the
    process keeps following updates started by other sources.
"#
    );
}

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = match RecoveryConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: cannot load configuration {:?}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    if args.verbose {
        config.logging.level = LogLevel::Debug;
    }
    if let Some(ref dir) = args.log_dir {
        config.logging = config.logging.clone().with_log_directory(dir.clone());
        if config.logging.output == LogOutput::Console {
            config.logging.output = LogOutput::Both;
        }
    }

    let logging = match LoggingSystem::init(config.logging.clone()) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    match logging.log_directory() {
        Some(dir) => tracing::info!("Logging at level {} into {:?}", logging.log_level(), dir),
        None => tracing::info!("Logging at level {}", logging.log_level()),
    }

    if let Err(e) = run(args, config) {
        match error_class(&e) {
            Some(class) => tracing::error!(?class, "{:#}", e),
            None => tracing::error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

/// Class of the library error behind `e`, if there is one
fn error_class(e: &anyhow::Error) -> Option<ErrorClass> {
    if let Some(e) = e.downcast_ref::<RecoveryError>() {
        return Some(e.class());
    }
    e.downcast_ref::<MonitorError>().map(Classify::class)
}

fn run(args: Args, config: RecoveryConfig) -> anyhow::Result<()> {
    let context = RecoveryContext::new(config).context("Cannot open the progress channel")?;
    let engine: Arc<dyn UpdateEngine> = Arc::new(SocketEngine::new(context.config().engine.clone()));

    let mut monitor =
        UpdateMonitor::spawn(Arc::clone(&engine), &context).context("Cannot start the update monitor")?;

    let initiator = UpdateInitiator::new(Arc::clone(&engine), &context);
    if let Some(ref path) = args.install {
        tracing::info!("Installing {:?}{}", path, if args.dry_run { " (dry run)" } else { "" });
        // a refused start is reported to the display as a FAILURE record
        if let Err(e) = initiator.start_local_update(path, args.dry_run) {
            tracing::warn!("{}", e);
        }
    }

    let mut dispatcher = ProgressDispatcher::new(&context);
    let mut display = ConsoleDisplay::stdout();
    let tick = Duration::from_millis(context.config().ui.tick_interval_ms);

    loop {
        dispatcher.drain(&mut display);

        for success in dispatcher.take_finished() {
            if args.export_logs {
                export_notifications(&context);
            }
            if args.install.is_some() {
                monitor.stop().context("Update monitor failed")?;
                if !success {
                    bail!("Update failed");
                }
                return Ok(());
            }
        }

        if monitor.is_finished() {
            monitor.stop().context("Update monitor stopped")?;
            bail!("Update monitor stopped unexpectedly");
        }

        std::thread::sleep(tick);
    }
}

fn export_notifications(context: &RecoveryContext) {
    let media_path = &context.config().export.media_path;
    match export_log(&context.log(), media_path) {
        Ok(result) => tracing::info!(
            "Exported {} notification entries to {:?}",
            result.entries_exported,
            result.output_path
        ),
        Err(e) => tracing::warn!("Log export to {:?} failed: {}", media_path, e),
    }
}
