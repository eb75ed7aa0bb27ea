//! finsync - keep a local mirror of the TDX financial snapshots
//!
//! Syncs `gpcw*.zip` packages against the server manifest, converts them to
//! Parquet, and exports the `gbbq` corporate-action file as CSV.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::{Parser, Subcommand};
use finsync_core::shutdown_flag;

mod cmd;
mod config;

use config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "finsync")]
#[command(about = "Mirror TDX financial snapshots and convert them to Parquet")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./finsync.toml or ~/.config/finsync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Download, unpack and convert everything out of date, then export gbbq
    Sync(cmd::sync::SyncArgs),
    /// Show what a sync would do, without touching disk
    Plan,
    /// Export the gbbq corporate-action file only
    Gbbq,
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(finsync_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    finsync_core::init_logging(quiet, cli.debug, multi);

    setup_signal_handler();

    match run(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            if shutdown_flag().load(Ordering::Relaxed) {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli, progress: &finsync_core::SharedProgress) -> Result<ExitCode> {
    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    let overrides = Overrides {
        max_retries: cli.max_retries,
        read_timeout: cli.read_timeout,
        ..Default::default()
    };

    match cli.command {
        Command::Sync(args) => cmd::sync::run(args, &config, overrides, progress),
        Command::Plan => cmd::plan::run(&config, overrides, progress),
        Command::Gbbq => cmd::gbbq::run(&config, overrides, progress),
        Command::Config => {
            cmd::print_config(&config.pipeline(overrides));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        let registered = unsafe {
            signal_hook::low_level::register(signal, || {
                if finsync_core::request_shutdown() {
                    std::process::exit(130);
                }
            })
        };
        if let Err(e) = registered {
            log::warn!("Failed to register handler for signal {signal}: {e}");
        }
    }
}
