//! Pipeline coordinator for the TDX sync
//!
//! Sequences manifest → diff → fetch/unpack/decode/persist, then the
//! independent corporate-action export. Holds no state between runs: every
//! run re-derives the plan from disk.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use finsync_core::{
    SharedProgress, SyncError, Transport, cleanup_tmp_files, fmt_num, retry_with_backoff,
    shutdown_flag,
};

use crate::config::Config;
use crate::decode::Decoder;
use crate::diff::{self, Plan, PlanReason};
use crate::fetch::{FetchExecutor, Outcome};
use crate::inventory::LocalInventory;
use crate::manifest::{Manifest, ManifestClient};
use crate::persist::save_corporate_actions;
use crate::worker::Worker;

/// Where a run is (or stopped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Start,
    ManifestFetched,
    Diffed,
    Syncing,
    CorporateActionsProcessed,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::ManifestFetched => "manifest-fetched",
            Self::Diffed => "diffed",
            Self::Syncing => "syncing",
            Self::CorporateActionsProcessed => "corporate-actions-processed",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Result of the corporate-action branch
#[derive(Debug)]
pub enum CorporateActionOutcome {
    Exported { rows: usize, path: PathBuf },
    Disabled,
    /// Skipped because shutdown was requested
    Cancelled,
    Failed(SyncError),
}

impl CorporateActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for CorporateActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exported { rows, path } => {
                write!(f, "{} rows → {}", fmt_num(*rows), path.display())
            }
            Self::Disabled => f.write_str("disabled"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Run summary
#[derive(Debug)]
pub struct RunSummary {
    pub phase: RunPhase,
    pub manifest_entries: usize,
    pub planned: usize,
    pub missing: usize,
    pub stale: usize,
    pub undecoded: usize,
    pub succeeded: usize,
    pub failed: Vec<(String, SyncError)>,
    pub cancelled: usize,
    pub bytes_downloaded: u64,
    pub rows_written: usize,
    pub corporate_actions: CorporateActionOutcome,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn was_cancelled(&self) -> bool {
        self.cancelled > 0 || matches!(self.corporate_actions, CorporateActionOutcome::Cancelled)
    }

    pub fn log(&self) {
        log::info!("=== TDX Sync Summary ===");
        log::info!(
            "Manifest: {} entries, {} planned ({} missing, {} stale, {} undecoded)",
            fmt_num(self.manifest_entries),
            self.planned,
            self.missing,
            self.stale,
            self.undecoded
        );
        log::info!(
            "Items: {}/{} succeeded, {} failed, {} cancelled",
            self.succeeded,
            self.planned,
            self.failed.len(),
            self.cancelled
        );
        for (name, e) in &self.failed {
            log::warn!("  {name}: [{}] {e}", e.kind());
        }
        log::info!(
            "Downloaded: {:.1} MiB, rows written: {}",
            self.bytes_downloaded as f64 / (1024.0 * 1024.0),
            fmt_num(self.rows_written)
        );
        log::info!("Corporate actions: {}", self.corporate_actions);
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

/// Drives one sync run
pub struct Coordinator {
    config: Config,
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn Decoder>,
    progress: SharedProgress,
    cancel: &'static AtomicBool,
    phase: RunPhase,
}

impl Coordinator {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn Decoder>,
        progress: SharedProgress,
    ) -> Self {
        Self {
            config,
            transport,
            decoder,
            progress,
            cancel: shutdown_flag(),
            phase: RunPhase::Start,
        }
    }

    /// Use a cancellation flag other than the process-wide shutdown flag
    pub fn with_cancel_flag(mut self, cancel: &'static AtomicBool) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn advance(&mut self, next: RunPhase) {
        log::debug!("phase: {} → {next}", self.phase);
        self.phase = next;
    }

    fn inventory(&self) -> LocalInventory {
        LocalInventory::new(&self.config.package_dir, &self.config.snapshot_dir)
    }

    /// Fetch the manifest, retrying transient failures with backoff
    pub fn fetch_manifest(&self) -> Result<Manifest, SyncError> {
        let pb = self.progress.stage_line("manifest");
        pb.set_message(self.config.manifest_url.clone());
        let client = ManifestClient::new(self.transport.as_ref(), &self.config.manifest_url);
        let result = retry_with_backoff("manifest", self.config.max_retries, &pb, || client.fetch());
        pb.finish_and_clear();
        result
    }

    /// Fetch and diff only; touches nothing on disk
    pub fn plan(&self) -> Result<(Manifest, Plan)> {
        let manifest = self
            .fetch_manifest()
            .context("Failed to fetch manifest")?;
        let plan = diff::plan(&manifest, &self.inventory())?;
        Ok((manifest, plan))
    }

    /// Full run: sync every planned item, then export corporate actions.
    ///
    /// Returns `Err` only when no plan could be made (manifest unavailable or
    /// local directories unusable). Per-item failures land in the summary.
    pub fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        self.advance(RunPhase::Start);

        let manifest = match self.fetch_manifest() {
            Ok(m) => m,
            Err(e) => {
                self.advance(RunPhase::Failed);
                return Err(e).context("Failed to fetch manifest");
            }
        };
        log::info!(
            "Manifest lists {} packages ({:.1} MiB)",
            fmt_num(manifest.len()),
            manifest.total_size() as f64 / (1024.0 * 1024.0)
        );
        self.advance(RunPhase::ManifestFetched);

        let (plan, executor) = match self.prepare(&manifest) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.advance(RunPhase::Failed);
                return Err(e);
            }
        };
        self.advance(RunPhase::Diffed);
        match &executor {
            Some(executor) => log::info!(
                "{} to process with {} workers",
                plan.len(),
                executor.workers()
            ),
            None => log::info!("Everything up to date"),
        }

        // Nothing past this point can abort the run
        self.advance(RunPhase::Syncing);
        let outcomes = match &executor {
            Some(executor) => executor.run(&plan, &manifest),
            None => BTreeMap::new(),
        };

        let corporate_actions = if self.cancel.load(Ordering::Relaxed) {
            CorporateActionOutcome::Cancelled
        } else {
            self.process_corporate_actions()
        };
        self.advance(RunPhase::CorporateActionsProcessed);

        let mut summary = RunSummary {
            phase: RunPhase::Done,
            manifest_entries: manifest.len(),
            planned: plan.len(),
            missing: plan.count(PlanReason::Missing),
            stale: plan.count(PlanReason::Stale),
            undecoded: plan.count(PlanReason::Undecoded),
            succeeded: 0,
            failed: Vec::new(),
            cancelled: 0,
            bytes_downloaded: 0,
            rows_written: 0,
            corporate_actions,
            elapsed: Duration::ZERO,
        };
        for (name, outcome) in outcomes {
            match outcome {
                Outcome::Success(stats) => {
                    summary.succeeded += 1;
                    summary.bytes_downloaded += stats.bytes;
                    summary.rows_written += stats.rows;
                }
                Outcome::Failure(e) => summary.failed.push((name, e)),
                Outcome::Cancelled => summary.cancelled += 1,
            }
        }

        self.advance(RunPhase::Done);
        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    /// Plan the run and, when there is work, build the worker pool for it
    fn prepare(&self, manifest: &Manifest) -> Result<(Plan, Option<FetchExecutor>)> {
        let plan = self.prepare_and_plan(manifest)?;
        if plan.is_empty() {
            return Ok((plan, None));
        }
        let worker = Arc::new(Worker::new(
            &self.config,
            Arc::clone(&self.transport),
            Arc::clone(&self.decoder),
        ));
        let executor = FetchExecutor::new(
            worker,
            self.config.workers,
            Arc::clone(&self.progress),
            self.cancel,
        )?;
        Ok((plan, Some(executor)))
    }

    /// Create output directories, clear stale staging files, and diff
    fn prepare_and_plan(&self, manifest: &Manifest) -> Result<Plan> {
        if self.inventory().scan_packages()?.is_missing() {
            log::info!(
                "First run: {} does not exist yet",
                self.config.package_dir.display()
            );
        }
        for dir in [
            &self.config.package_dir,
            &self.config.snapshot_dir,
            &self.config.corporate_action_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let removed = cleanup_tmp_files(dir)
                .with_context(|| format!("Failed to clean {}", dir.display()))?;
            if removed > 0 {
                log::info!("Removed {removed} stale tmp file(s) in {}", dir.display());
            }
        }
        diff::plan(manifest, &self.inventory())
    }

    /// Decode the corporate-action file and export it as CSV
    pub fn process_corporate_actions(&self) -> CorporateActionOutcome {
        if !self.config.corporate_actions_enabled {
            return CorporateActionOutcome::Disabled;
        }
        if self.config.corporate_action_key.is_none() {
            log::warn!(
                "Skipping corporate actions: no gbbq key table configured \
                 (set corporate_actions.key_file)"
            );
            return CorporateActionOutcome::Disabled;
        }
        let input = &self.config.corporate_action_input;
        let pb = self.progress.stage_line("gbbq");
        pb.set_message(format!("decoding {}", input.display()));

        let result = self
            .decoder
            .decode_corporate_actions(input)
            .map_err(SyncError::from)
            .and_then(|records| {
                pb.set_message(format!("writing {} records", fmt_num(records.len())));
                let path = self.config.corporate_action_output();
                save_corporate_actions(&path, &records).map(|rows| (rows, path))
            });
        pb.finish_and_clear();

        match result {
            Ok((rows, path)) => {
                log::info!("Corporate actions: {} rows → {}", fmt_num(rows), path.display());
                CorporateActionOutcome::Exported { rows, path }
            }
            Err(e) => {
                log::error!("Corporate-action export failed: {e}");
                CorporateActionOutcome::Failed(e)
            }
        }
    }
}
