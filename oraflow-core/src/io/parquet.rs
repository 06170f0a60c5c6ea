//! Parquet output.
//!
//! Mirrors a [`TabularResult`] into a snappy-compressed Parquet file so the
//! snapshot can also feed the analytics side without re-querying the
//! database. Binary columns arrive base64-rendered and go out as text.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType as ArrowType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::Datelike;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::error::OraflowError;
use crate::models::{DataType, TabularResult, Value};
use crate::Result;

// Days from 0001-01-01 (CE) to the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Writes the result to `path` as one snappy-compressed Parquet file.
///
/// An empty result produces a schema-only file.
///
/// # Errors
/// `FileFormat` when the conversion or the write fails.
pub fn write_parquet(result: &TabularResult, path: &Path) -> Result<()> {
    let fields: Vec<Field> = result
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(&c.data_type), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let file = File::create(path)
        .map_err(|e| OraflowError::io(format!("creating {}", path.display()), e))?;
    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(properties))
        .map_err(|e| map_write_error(path, &e))?;

    if !result.is_empty() {
        let arrays: Vec<ArrayRef> = result
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, c)| build_array(result, idx, &c.data_type))
            .collect();
        let batch = RecordBatch::try_new(schema, arrays)
            .map_err(|e| OraflowError::file_format(format!("{}: {e}", path.display())))?;
        writer.write(&batch).map_err(|e| map_write_error(path, &e))?;
    }
    writer.close().map_err(|e| map_write_error(path, &e))?;

    info!(
        "Wrote {} rows to parquet {}",
        result.row_count(),
        path.display()
    );
    Ok(())
}

fn map_write_error(path: &Path, e: &parquet::errors::ParquetError) -> OraflowError {
    OraflowError::file_format(format!("{}: {e}", path.display()))
}

fn arrow_type(data_type: &DataType) -> ArrowType {
    match data_type {
        DataType::Integer => ArrowType::Int64,
        DataType::Float => ArrowType::Float64,
        DataType::Boolean => ArrowType::Boolean,
        DataType::Date => ArrowType::Date32,
        DataType::Timestamp => ArrowType::Timestamp(TimeUnit::Microsecond, None),
        DataType::Text { .. } | DataType::Binary | DataType::Other { .. } => ArrowType::Utf8,
    }
}

fn build_array(result: &TabularResult, idx: usize, data_type: &DataType) -> ArrayRef {
    let cells = || result.rows().iter().map(|r| &r[idx]);
    match data_type {
        DataType::Integer => Arc::new(
            cells()
                .map(|v| match v {
                    Value::Integer(n) => Some(*n),
                    Value::Boolean(b) => Some(i64::from(*b)),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Float => Arc::new(
            cells()
                .map(|v| match v {
                    Value::Float(n) => Some(*n),
                    #[allow(clippy::cast_precision_loss)]
                    Value::Integer(n) => Some(*n as f64),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        DataType::Boolean => Arc::new(
            cells()
                .map(|v| match v {
                    Value::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        DataType::Date => Arc::new(
            cells()
                .map(|v| match v {
                    Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    _ => None,
                })
                .collect::<Date32Array>(),
        ),
        DataType::Timestamp => Arc::new(
            cells()
                .map(|v| match v {
                    Value::Timestamp(t) => Some(t.and_utc().timestamp_micros()),
                    Value::Date(d) => d
                        .and_hms_opt(0, 0, 0)
                        .map(|t| t.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>(),
        ),
        DataType::Text { .. } | DataType::Binary | DataType::Other { .. } => Arc::new(
            cells()
                .map(|v| if v.is_null() { None } else { Some(v.render()) })
                .collect::<StringArray>(),
        ),
    }
}
