//! Durable derived outputs: one parquet per snapshot, one CSV for corporate actions

use std::fs;
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use finsync_core::{CsvSink, SyncError, write_parquet};

use crate::category::category_label;
use crate::decode::CorporateActionRecord;
use crate::inventory::snapshot_name;

pub const CORPORATE_ACTION_HEADER: [&str; 7] = [
    "code",
    "ex_rights_date",
    "category",
    "pre_float_shares",
    "pre_total_shares",
    "post_float_shares",
    "post_total_shares",
];

/// Writes decoded tables under the configured output directories
#[derive(Debug, Clone)]
pub struct PersistStage {
    snapshot_dir: PathBuf,
    zstd_level: i32,
}

impl PersistStage {
    pub fn new(snapshot_dir: impl Into<PathBuf>, zstd_level: i32) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            zstd_level,
        }
    }

    /// Write `<snapshot_dir>/<stem>.parquet` for package `name`; returns rows written
    pub fn save_snapshot(&self, name: &str, table: &RecordBatch) -> Result<usize, SyncError> {
        fs::create_dir_all(&self.snapshot_dir).map_err(SyncError::Persist)?;
        let path = self.snapshot_dir.join(snapshot_name(name));
        let rows = write_parquet(&path, table, self.zstd_level).map_err(SyncError::Persist)?;
        log::debug!("{name}: wrote {rows} rows to {}", path.display());
        Ok(rows)
    }
}

/// Export corporate actions to `path` as CSV.
///
/// Every category is resolved before the file is opened, so an unknown code
/// leaves any previous export untouched.
pub fn save_corporate_actions(
    path: &Path,
    records: &[CorporateActionRecord],
) -> Result<usize, SyncError> {
    let labels = records
        .iter()
        .map(|r| category_label(r.category_code))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(SyncError::Persist)?;
    }
    let mut sink = CsvSink::create(path, &CORPORATE_ACTION_HEADER).map_err(SyncError::Persist)?;
    for (record, label) in records.iter().zip(labels) {
        let row = [
            record.code.clone(),
            record.ex_rights_date.format("%Y-%m-%d").to_string(),
            label.to_string(),
            record.pre_float_shares.to_string(),
            record.pre_total_shares.to_string(),
            record.post_float_shares.to_string(),
            record.post_total_shares.to_string(),
        ];
        if let Err(e) = sink.write_row(&row) {
            sink.abort();
            return Err(SyncError::Persist(e));
        }
    }
    sink.finalize().map_err(SyncError::Persist)
}
