//! Per-item pipeline: download → verify → unpack → decode → persist

use std::sync::Arc;
use std::time::{Duration, Instant};

use finsync_core::progress::downgrade_to_status;
use finsync_core::{
    StreamError, SyncError, Transport, commit, digests_match, hash_file, remove_if_exists,
    retry_with_backoff, short_hash, staging_path,
};
use indicatif::ProgressBar;

use crate::archive::ArchiveStage;
use crate::config::Config;
use crate::decode::Decoder;
use crate::diff::PlanReason;
use crate::inventory::{LocalInventory, LocalPackage};
use crate::manifest::ManifestEntry;
use crate::persist::PersistStage;

/// What one successful item produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStats {
    /// Bytes fetched (0 when only re-decoded)
    pub bytes: u64,
    /// Rows in the snapshot output
    pub rows: usize,
    pub elapsed: Duration,
}

/// Everything a worker thread needs, shared across the pool
pub struct Worker {
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn Decoder>,
    inventory: LocalInventory,
    archive: ArchiveStage,
    persist: PersistStage,
    config: Config,
}

impl Worker {
    pub fn new(config: &Config, transport: Arc<dyn Transport>, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            transport,
            decoder,
            inventory: LocalInventory::new(&config.package_dir, &config.snapshot_dir),
            archive: ArchiveStage::new(&config.package_dir),
            persist: PersistStage::new(&config.snapshot_dir, config.zstd_level),
            config: config.clone(),
        }
    }

    /// Run the full pipeline for one manifest entry.
    ///
    /// Every file touched is scoped to `entry.name` and goes through a staging
    /// path, so concurrent items never see each other's partial state.
    pub fn process(
        &self,
        entry: &ManifestEntry,
        reason: PlanReason,
        pb: &ProgressBar,
    ) -> Result<ItemStats, SyncError> {
        let start = Instant::now();
        let deadline = start + self.config.item_deadline;

        let bytes = if reason.needs_download() {
            pb.set_message("downloading");
            retry_with_backoff(&entry.name, self.config.max_retries, pb, || {
                self.download_once(entry, deadline, pb)
            })?
        } else {
            0
        };

        downgrade_to_status(pb, "unpacking");
        let package = LocalPackage {
            name: entry.name.clone(),
            path: self.inventory.package_path(&entry.name),
        };
        self.archive.unpack(&package)?;

        downgrade_to_status(pb, "decoding");
        let table = self
            .decoder
            .decode_snapshot(&self.inventory.raw_path(&entry.name))?;

        downgrade_to_status(pb, "writing");
        let rows = self.persist.save_snapshot(&entry.name, &table)?;

        Ok(ItemStats {
            bytes,
            rows,
            elapsed: start.elapsed(),
        })
    }

    /// One download attempt into `<name>.tmp`, verified and renamed on success.
    /// The final path is untouched unless the new bytes check out.
    ///
    /// The previous snapshot output belongs to the package being replaced and
    /// is removed before the new package lands, so no crash point leaves a
    /// current package next to an old output.
    fn download_once(
        &self,
        entry: &ManifestEntry,
        deadline: Instant,
        pb: &ProgressBar,
    ) -> Result<u64, SyncError> {
        let final_path = self.inventory.package_path(&entry.name);
        let tmp = staging_path(&final_path);
        let url = self.config.package_url(&entry.name);

        let result = (|| -> Result<u64, SyncError> {
            let written = self.transport.download(&url, &tmp, deadline, pb)?;
            verify(entry, &tmp, written)?;
            remove_if_exists(&self.inventory.snapshot_path(&entry.name))
                .map_err(SyncError::Persist)?;
            commit(&tmp, &final_path).map_err(SyncError::Persist)?;
            Ok(written)
        })();

        if result.is_err() {
            if let Err(e) = remove_if_exists(&tmp) {
                log::warn!("{}: could not remove {}: {e}", entry.name, tmp.display());
            }
        }
        result
    }
}

/// Check a staged download against its manifest entry
fn verify(entry: &ManifestEntry, path: &std::path::Path, written: u64) -> Result<(), SyncError> {
    if entry.size > 0 && written != entry.size {
        return Err(StreamError::Integrity(format!(
            "{}: got {written} bytes, manifest says {}",
            entry.name, entry.size
        ))
        .into());
    }
    let actual = hash_file(path).map_err(StreamError::Io)?;
    if !digests_match(&actual, &entry.content_hash) {
        return Err(StreamError::Integrity(format!(
            "{}: md5 {} != manifest {}",
            entry.name,
            short_hash(&actual),
            short_hash(&entry.content_hash)
        ))
        .into());
    }
    Ok(())
}
