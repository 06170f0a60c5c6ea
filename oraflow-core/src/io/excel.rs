//! Excel workbook output.
//!
//! Writes one [`TabularResult`] per workbook into a sheet named `DATA`,
//! header row first, matching what the downstream planning tool imports.

use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::error::OraflowError;
use crate::models::{TabularResult, Value};
use crate::Result;

/// Worksheet name the downstream import macro expects
const SHEET_NAME: &str = "DATA";

/// Writes the result to `path` as a single-sheet workbook.
///
/// An empty result still produces a workbook with the header row, so a
/// snapshot with no data for a group is visibly empty rather than missing.
///
/// # Errors
/// `FileFormat` when the workbook cannot be written.
pub fn write_workbook(result: &TabularResult, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(SHEET_NAME)
        .map_err(|e| map_xlsx_error(path, &e))?;

    for (col, name) in result.column_names().iter().enumerate() {
        write_checked(worksheet.write_string(0, col_index(col)?, *name), path)?;
    }
    for (row, values) in result.rows().iter().enumerate() {
        let row_index = u32::try_from(row + 1)
            .map_err(|_| OraflowError::file_format("row count exceeds worksheet limits"))?;
        for (col, value) in values.iter().enumerate() {
            write_cell(worksheet, row_index, col_index(col)?, value, path)?;
        }
    }

    workbook.save(path).map_err(|e| map_xlsx_error(path, &e))?;
    info!(
        "Wrote {} rows to workbook {}",
        result.row_count(),
        path.display()
    );
    Ok(())
}

#[allow(clippy::cast_precision_loss)] // forecast quantities are far below 2^53
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    path: &Path,
) -> Result<()> {
    let outcome = match value {
        Value::Null => return Ok(()),
        Value::Integer(v) => worksheet.write_number(row, col, *v as f64),
        Value::Float(v) => worksheet.write_number(row, col, *v),
        Value::Boolean(v) => worksheet.write_boolean(row, col, *v),
        Value::Text(v) => worksheet.write_string(row, col, v),
        // Dates go out as ISO text so no workbook date-system ambiguity
        date @ (Value::Date(_) | Value::Timestamp(_)) => {
            worksheet.write_string(row, col, date.render())
        }
    };
    write_checked(outcome, path)
}

fn write_checked(
    outcome: std::result::Result<&mut Worksheet, XlsxError>,
    path: &Path,
) -> Result<()> {
    outcome.map(|_| ()).map_err(|e| map_xlsx_error(path, &e))
}

fn col_index(col: usize) -> Result<u16> {
    u16::try_from(col)
        .map_err(|_| OraflowError::file_format("column count exceeds worksheet limits"))
}

fn map_xlsx_error(path: &Path, e: &XlsxError) -> OraflowError {
    OraflowError::file_format(format!("writing {}: {e}", path.display()))
}
