//! `gpcwYYYYMMDD.dat` financial snapshot layout
//!
//! ```text
//! header   i16 _, u32 report_date, u16 max_count, u32 _, u32 report_size, u32 _
//! index    max_count × (6-byte code, u8 _, u32 offset)
//! reports  report_size / 4 × f32 at each offset
//! ```
//! All integers little-endian.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use super::{fixed_str, le_f32, le_u16, le_u32};

const HEADER_LEN: usize = 20;
const INDEX_ENTRY_LEN: usize = 11;

/// `code`, `report_date`, then `col1..=colN` floats
pub fn snapshot_schema(columns: usize) -> Schema {
    let mut fields = Vec::with_capacity(columns + 2);
    fields.push(Field::new("code", DataType::Utf8, false));
    fields.push(Field::new("report_date", DataType::UInt32, false));
    fields.extend((1..=columns).map(|i| Field::new(format!("col{i}"), DataType::Float64, false)));
    Schema::new(fields)
}

pub(super) fn decode(data: &[u8]) -> Result<RecordBatch, String> {
    if data.len() < HEADER_LEN {
        return Err(format!("file is {} bytes, header needs {HEADER_LEN}", data.len()));
    }
    let truncated = || "truncated header".to_string();
    let report_date = le_u32(data, 2).ok_or_else(truncated)?;
    let max_count = le_u16(data, 6).ok_or_else(truncated)? as usize;
    let report_size = le_u32(data, 12).ok_or_else(truncated)? as usize;
    let columns = report_size / 4;

    let mut codes = Vec::with_capacity(max_count);
    let mut values: Vec<Vec<f64>> = (0..columns).map(|_| Vec::with_capacity(max_count)).collect();

    for i in 0..max_count {
        let entry = HEADER_LEN + i * INDEX_ENTRY_LEN;
        let code = data
            .get(entry..entry + 6)
            .ok_or_else(|| format!("index entry {i} past end of file"))?;
        let offset = le_u32(data, entry + 7)
            .ok_or_else(|| format!("index entry {i} past end of file"))?
            as usize;

        for (col, column) in values.iter_mut().enumerate() {
            let v = le_f32(data, offset + col * 4)
                .ok_or_else(|| format!("report {i} at offset {offset} past end of file"))?;
            column.push(f64::from(v));
        }
        codes.push(fixed_str(code));
    }

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns + 2);
    arrays.push(Arc::new(StringArray::from(codes)));
    arrays.push(Arc::new(UInt32Array::from(vec![report_date; max_count])));
    arrays.extend(
        values
            .into_iter()
            .map(|col| Arc::new(Float64Array::from(col)) as ArrayRef),
    );

    RecordBatch::try_new(Arc::new(snapshot_schema(columns)), arrays).map_err(|e| e.to_string())
}
