//! Binary decoders for unpacked TDX files
//!
//! The pipeline only talks to [`Decoder`]; [`TdxDecoder`] is the stock
//! implementation for `gpcw*.dat` snapshots and the `gbbq` corporate-action file.

mod gbbq;
mod gpcw;

use std::fmt;
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use finsync_core::SyncError;

use gbbq::KEY_TABLE_LEN;
pub use gpcw::snapshot_schema;

/// One corporate-action event, market byte already dropped
#[derive(Debug, Clone, PartialEq)]
pub struct CorporateActionRecord {
    pub code: String,
    pub ex_rights_date: NaiveDate,
    /// Raw category code; resolved to a label at persist time
    pub category_code: i64,
    pub pre_float_shares: f64,
    pub pre_total_shares: f64,
    pub post_float_shares: f64,
    pub post_total_shares: f64,
}

/// Decoder rejected an input file
#[derive(Debug, Clone)]
pub struct DecodeError {
    pub path: PathBuf,
    pub message: String,
}

impl DecodeError {
    pub fn new(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for SyncError {
    fn from(e: DecodeError) -> Self {
        SyncError::Parse(e.to_string())
    }
}

/// Turns raw files into in-memory tables
pub trait Decoder: Send + Sync {
    /// Decode one unpacked snapshot file into a table
    fn decode_snapshot(&self, path: &Path) -> Result<RecordBatch, DecodeError>;

    /// Decode the corporate-action file into records
    fn decode_corporate_actions(
        &self,
        path: &Path,
    ) -> Result<Vec<CorporateActionRecord>, DecodeError>;
}

/// Stock decoder for the TDX binary formats
#[derive(Debug, Clone, Default)]
pub struct TdxDecoder {
    /// Cipher key table for `gbbq`; required for corporate actions only
    pub key_file: Option<PathBuf>,
}

impl TdxDecoder {
    pub fn new(key_file: Option<PathBuf>) -> Self {
        Self { key_file }
    }

    fn load_key(&self) -> Result<Vec<u8>, DecodeError> {
        let Some(key_file) = &self.key_file else {
            return Err(DecodeError::new(
                Path::new("<key>"),
                "no corporate-action key table configured",
            ));
        };
        let key = std::fs::read(key_file)
            .map_err(|e| DecodeError::new(key_file, format!("cannot read key table: {e}")))?;
        if key.len() < KEY_TABLE_LEN {
            return Err(DecodeError::new(
                key_file,
                format!("key table is {} bytes, need {KEY_TABLE_LEN}", key.len()),
            ));
        }
        Ok(key)
    }
}

impl Decoder for TdxDecoder {
    fn decode_snapshot(&self, path: &Path) -> Result<RecordBatch, DecodeError> {
        let data = std::fs::read(path).map_err(|e| DecodeError::new(path, e.to_string()))?;
        gpcw::decode(&data).map_err(|msg| DecodeError::new(path, msg))
    }

    fn decode_corporate_actions(
        &self,
        path: &Path,
    ) -> Result<Vec<CorporateActionRecord>, DecodeError> {
        let key = self.load_key()?;
        let data = std::fs::read(path).map_err(|e| DecodeError::new(path, e.to_string()))?;
        gbbq::decode(&data, &key).map_err(|msg| DecodeError::new(path, msg))
    }
}

/// Little-endian readers over a byte slice; `None` past the end
pub(crate) fn le_u16(data: &[u8], off: usize) -> Option<u16> {
    data.get(off..off + 2)?.try_into().ok().map(u16::from_le_bytes)
}

pub(crate) fn le_u32(data: &[u8], off: usize) -> Option<u32> {
    data.get(off..off + 4)?.try_into().ok().map(u32::from_le_bytes)
}

pub(crate) fn le_f32(data: &[u8], off: usize) -> Option<f32> {
    data.get(off..off + 4)?.try_into().ok().map(f32::from_le_bytes)
}

/// Fixed-width text field, NUL padded
pub(crate) fn fixed_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}
