//! `finsync gbbq`: corporate-action export only

use std::process::ExitCode;

use anyhow::{Result, bail};
use finsync_core::SharedProgress;
use finsync_tdx::CorporateActionOutcome;

use crate::config::{Config, Overrides};

pub fn run(config: &Config, overrides: Overrides, progress: &SharedProgress) -> Result<ExitCode> {
    let mut pipeline = config.pipeline(overrides);
    // Asking for it explicitly beats `enabled = false` in the file
    pipeline.corporate_actions_enabled = true;
    if pipeline.corporate_action_key.is_none() {
        bail!("no gbbq key table configured; set corporate_actions.key_file in the config file");
    }
    std::fs::create_dir_all(&pipeline.corporate_action_dir)?;

    let coordinator = super::coordinator(pipeline, progress);
    match coordinator.process_corporate_actions() {
        CorporateActionOutcome::Exported { rows, path } => {
            super::print_summary(
                "Corporate actions",
                &[
                    ("Rows", finsync_core::fmt_num(rows)),
                    ("Output", path.display().to_string()),
                ],
            );
            Ok(ExitCode::SUCCESS)
        }
        CorporateActionOutcome::Failed(e) => bail!("gbbq export failed: {e}"),
        other => {
            log::warn!("gbbq export {other}");
            Ok(ExitCode::FAILURE)
        }
    }
}
