//! Output sinks with atomic tmp→rename
//!
//! Nothing is ever written directly at a final path: every sink writes
//! `<final>.tmp` and renames on success, so a reader (or a crashed run) can only
//! ever observe the previous complete file or the new complete file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

/// Suffix appended to a final path while its content is being produced
pub const TMP_SUFFIX: &str = "tmp";

/// Staging path for `final_path` (`foo.parquet` → `foo.parquet.tmp`)
pub fn staging_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".");
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Move a finished staging file onto its final path
pub fn commit(tmp_path: &Path, final_path: &Path) -> io::Result<()> {
    fs::rename(tmp_path, final_path)
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Buffered parquet writer with atomic tmp→rename
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("final_path", &self.final_path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Create a new sink writing to a temporary file next to `final_path`
    pub fn create(final_path: &Path, schema: &Schema, zstd_level: i32) -> io::Result<Self> {
        let tmp_path = staging_path(final_path);

        // Clean up stale tmp file
        remove_if_exists(&tmp_path)?;

        let level = ZstdLevel::try_new(zstd_level)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(level))
            .set_max_row_group_size(1024 * 1024) // 1M rows per row group
            .build();

        let file = File::create(&tmp_path)?;
        let writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(props))
            .map_err(io::Error::other)?;

        Ok(Self {
            writer,
            tmp_path,
            final_path: final_path.to_path_buf(),
            row_count: 0,
        })
    }

    /// Write a record batch
    pub fn write_batch(&mut self, batch: &RecordBatch) -> io::Result<()> {
        self.row_count += batch.num_rows();
        self.writer.write(batch).map_err(io::Error::other)
    }

    /// Finalize: flush footer and atomically rename tmp → final
    pub fn finalize(self) -> io::Result<usize> {
        let row_count = self.row_count;
        self.writer.close().map_err(io::Error::other)?;
        commit(&self.tmp_path, &self.final_path)?;
        Ok(row_count)
    }

    /// Drop the writer and remove the staging file
    pub fn abort(self) {
        let tmp = self.tmp_path.clone();
        drop(self.writer);
        let _ = remove_if_exists(&tmp);
    }
}

/// Write one batch as a complete parquet file
pub fn write_parquet(final_path: &Path, batch: &RecordBatch, zstd_level: i32) -> io::Result<usize> {
    let mut sink = ParquetSink::create(final_path, &batch.schema(), zstd_level)?;
    if let Err(e) = sink.write_batch(batch) {
        sink.abort();
        return Err(e);
    }
    sink.finalize()
}

/// CSV writer with atomic tmp→rename
pub struct CsvSink {
    writer: csv::Writer<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl CsvSink {
    pub fn create(final_path: &Path, header: &[&str]) -> io::Result<Self> {
        let tmp_path = staging_path(final_path);
        remove_if_exists(&tmp_path)?;
        let mut writer = csv::Writer::from_writer(File::create(&tmp_path)?);
        writer.write_record(header).map_err(io::Error::other)?;
        Ok(Self {
            writer,
            tmp_path,
            final_path: final_path.to_path_buf(),
            row_count: 0,
        })
    }

    pub fn write_row<I, T>(&mut self, row: I) -> io::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.row_count += 1;
        self.writer.write_record(row).map_err(io::Error::other)
    }

    pub fn finalize(self) -> io::Result<usize> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        commit(&self.tmp_path, &self.final_path)?;
        Ok(self.row_count)
    }

    pub fn abort(self) {
        let tmp = self.tmp_path.clone();
        drop(self.writer);
        let _ = remove_if_exists(&tmp);
    }
}

/// Check if a completed parquet file exists and has a valid footer
pub fn is_valid_parquet(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    parquet::file::reader::SerializedFileReader::new(file).is_ok()
}

/// Remove stale .tmp files in a directory (missing directory is fine)
pub fn cleanup_tmp_files(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == TMP_SUFFIX) {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
