//! `finsync plan`: dry run

use std::process::ExitCode;

use anyhow::Result;
use finsync_core::{SharedProgress, fmt_num};

use crate::config::{Config, Overrides};

pub fn run(config: &Config, overrides: Overrides, progress: &SharedProgress) -> Result<ExitCode> {
    let coordinator = super::coordinator(config.pipeline(overrides), progress);
    let (manifest, plan) = coordinator.plan()?;

    if plan.is_empty() {
        eprintln!(
            "Everything up to date ({} packages)",
            fmt_num(manifest.len())
        );
        return Ok(ExitCode::SUCCESS);
    }

    let rows: Vec<_> = plan
        .iter()
        .map(|(name, reason)| {
            let size = manifest.get(name).map_or(0, |e| e.size);
            let detail = if reason.needs_download() {
                format!("{reason}, {:.1} MiB to download", size as f64 / (1024.0 * 1024.0))
            } else {
                reason.to_string()
            };
            (name, detail)
        })
        .collect();
    super::print_summary("Package", &rows);
    eprintln!(
        "{} of {} packages need work",
        plan.len(),
        fmt_num(manifest.len())
    );
    Ok(ExitCode::SUCCESS)
}
