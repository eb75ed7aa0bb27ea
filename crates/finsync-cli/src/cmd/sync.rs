//! `finsync sync`: full run

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use finsync_core::{SharedProgress, fmt_num};
use finsync_tdx::RunSummary;

use crate::config::{Config, Overrides};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Number of concurrent package workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Skip the gbbq corporate-action export
    #[arg(long)]
    pub no_corporate_actions: bool,
}

pub fn run(
    args: SyncArgs,
    config: &Config,
    overrides: Overrides,
    progress: &SharedProgress,
) -> Result<ExitCode> {
    let pipeline = config.pipeline(Overrides {
        workers: args.workers,
        no_corporate_actions: args.no_corporate_actions,
        ..overrides
    });
    let mut coordinator = super::coordinator(pipeline, progress);
    let summary = coordinator.run()?;

    summary.log();
    print(&summary);

    Ok(exit_code(&summary))
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.was_cancelled() {
        ExitCode::from(130)
    } else if summary.corporate_actions.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print(summary: &RunSummary) {
    let mut rows = vec![
        ("Manifest entries", fmt_num(summary.manifest_entries)),
        (
            "Planned",
            format!(
                "{} ({} missing, {} stale, {} undecoded)",
                summary.planned, summary.missing, summary.stale, summary.undecoded
            ),
        ),
        ("Succeeded", summary.succeeded.to_string()),
        ("Failed", summary.failed.len().to_string()),
    ];
    if summary.cancelled > 0 {
        rows.push(("Cancelled", summary.cancelled.to_string()));
    }
    rows.extend([
        (
            "Downloaded",
            format!("{:.1} MiB", summary.bytes_downloaded as f64 / (1024.0 * 1024.0)),
        ),
        ("Rows written", fmt_num(summary.rows_written)),
        ("Corporate actions", summary.corporate_actions.to_string()),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ]);
    super::print_summary("TDX Sync", &rows);

    if !summary.failed.is_empty() {
        let failures: Vec<_> = summary
            .failed
            .iter()
            .map(|(name, e)| (name.as_str(), format!("[{}] {e}", e.kind())))
            .collect();
        super::print_summary("Failed package", &failures);
    }
}
