//! Bounded worker pool with channel-based result aggregation
//!
//! Items run on a dedicated rayon pool; each sends exactly one [`ItemReport`]
//! back over an mpsc channel. The calling thread is the only consumer, so the
//! overall bar and the outcome map need no shared counters.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use anyhow::Context;
use finsync_core::{SharedProgress, SyncError, fmt_num};

use crate::diff::Plan;
use crate::manifest::Manifest;
use crate::worker::{ItemStats, Worker};

/// Final state of one planned item
#[derive(Debug)]
pub enum Outcome {
    Success(ItemStats),
    Failure(SyncError),
    /// Shutdown was requested before the item started
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Message from a worker to the aggregator
#[derive(Debug)]
pub struct ItemReport {
    pub name: String,
    pub outcome: Outcome,
}

pub struct FetchExecutor {
    worker: Arc<Worker>,
    pool: rayon::ThreadPool,
    progress: SharedProgress,
    cancel: &'static AtomicBool,
}

impl FetchExecutor {
    /// Build the dedicated pool of `workers` threads (at least one)
    pub fn new(
        worker: Arc<Worker>,
        workers: usize,
        progress: SharedProgress,
        cancel: &'static AtomicBool,
    ) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("finsync-worker-{i}"))
            .build()
            .context("Failed to create worker pool")?;
        Ok(Self {
            worker,
            pool,
            progress,
            cancel,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Process every planned item; one item's failure never stops the others.
    pub fn run(&self, plan: &Plan, manifest: &Manifest) -> BTreeMap<String, Outcome> {
        let (tx, rx) = mpsc::channel::<ItemReport>();
        let mut submitted = 0usize;

        for (name, reason) in plan.iter() {
            let Some(entry) = manifest.get(name).cloned() else {
                log::warn!("{name}: planned but not in manifest, skipping");
                continue;
            };
            let tx = tx.clone();
            let worker = Arc::clone(&self.worker);
            let progress = Arc::clone(&self.progress);
            let cancel = self.cancel;
            submitted += 1;

            self.pool.spawn(move || {
                let outcome = if cancel.load(Ordering::Relaxed) {
                    Outcome::Cancelled
                } else {
                    let pb = progress.item_bar(&entry.name);
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        worker.process(&entry, reason, &pb)
                    }));
                    pb.finish_and_clear();
                    match result {
                        Ok(Ok(stats)) => Outcome::Success(stats),
                        Ok(Err(e)) => Outcome::Failure(e),
                        Err(payload) => Outcome::Failure(SyncError::from_panic(payload.as_ref())),
                    }
                };
                // Receiver outlives the pool; a send error means the run is being torn down
                let _ = tx.send(ItemReport {
                    name: entry.name,
                    outcome,
                });
            });
        }
        drop(tx);

        let overall = self.progress.overall_bar(submitted);
        let mut outcomes = BTreeMap::new();
        let mut failed = 0usize;
        for report in rx {
            match &report.outcome {
                Outcome::Success(stats) => log::info!(
                    "{}: {} rows ({:.1}s)",
                    report.name,
                    fmt_num(stats.rows),
                    stats.elapsed.as_secs_f64()
                ),
                Outcome::Failure(e) => {
                    failed += 1;
                    log::error!("{}: {e}", report.name);
                }
                Outcome::Cancelled => log::debug!("{}: cancelled", report.name),
            }
            overall.inc(1);
            if failed > 0 {
                overall.set_message(format!("{failed} failed"));
            }
            outcomes.insert(report.name, report.outcome);
        }
        overall.finish_and_clear();

        outcomes
    }
}
