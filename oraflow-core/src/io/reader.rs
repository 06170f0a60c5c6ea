//! Delimited text input.
//!
//! Reads `.csv` (comma) and `.tsv`/`.txt` (tab) files into a
//! [`TabularResult`], inferring a column type from the values actually
//! present. Inference is deliberately conservative: a column is an integer
//! only when every non-empty cell parses as one, and anything ambiguous
//! falls back to text so no value is mangled on the way to the database.

use std::path::Path;

use tracing::{debug, info};

use crate::error::OraflowError;
use crate::models::{Column, DataType, TabularResult, Value};
use crate::Result;

/// Reads a delimited file into memory.
///
/// The first record is the header. Every data record must have exactly one
/// field per header.
///
/// # Errors
/// `FileFormat` for an unsupported extension, a missing or duplicated
/// header, or ragged rows; `Io` when the file cannot be read.
pub fn read_delimited(path: &Path) -> Result<TabularResult> {
    let delimiter = delimiter_for(path)?;
    debug!("Reading {} with delimiter {:?}", path.display(), delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(|e| map_csv_error(path, &e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| map_csv_error(path, &e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(OraflowError::file_format(format!(
            "{}: missing header row",
            path.display()
        )));
    }
    for (i, header) in headers.iter().enumerate() {
        if header.is_empty() {
            return Err(OraflowError::file_format(format!(
                "{}: empty header in column {}",
                path.display(),
                i + 1
            )));
        }
        if headers[..i].iter().any(|h| h.eq_ignore_ascii_case(header)) {
            return Err(OraflowError::file_format(format!(
                "{}: duplicate column '{header}'",
                path.display()
            )));
        }
    }

    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| map_csv_error(path, &e))?;
        records.push(record.iter().map(|f| f.trim().to_string()).collect());
    }

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| Column::new(name.clone(), infer_type(&records, idx)))
        .collect();

    let types: Vec<DataType> = columns.iter().map(|c| c.data_type.clone()).collect();
    let mut result = TabularResult::new(columns);
    for record in &records {
        let row = record
            .iter()
            .zip(types.iter())
            .map(|(raw, data_type)| parse_cell(raw, data_type))
            .collect();
        result.push_row(row)?;
    }

    info!(
        "Read {} rows, {} columns from {}",
        result.row_count(),
        result.columns().len(),
        path.display()
    );
    Ok(result)
}

fn delimiter_for(path: &Path) -> Result<u8> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => Ok(b','),
        Some("tsv" | "txt") => Ok(b'\t'),
        _ => Err(OraflowError::file_format(format!(
            "{}: unsupported file type (expected .csv, .tsv or .txt)",
            path.display()
        ))),
    }
}

fn map_csv_error(path: &Path, e: &csv::Error) -> OraflowError {
    if e.is_io_error() {
        OraflowError::file_format(format!("{}: {e}", path.display()))
    } else {
        OraflowError::file_format(format!("{}: malformed content: {e}", path.display()))
    }
}

/// Picks the narrowest type every non-empty cell of the column fits.
/// A column with no values at all stays text.
fn infer_type(records: &[Vec<String>], idx: usize) -> DataType {
    let cells = || {
        records
            .iter()
            .filter_map(|r| r.get(idx))
            .filter(|c| !c.is_empty())
    };
    if cells().next().is_none() {
        return DataType::text();
    }
    if cells().all(|c| c.parse::<i64>().is_ok()) {
        return DataType::Integer;
    }
    if cells().all(|c| c.parse::<f64>().is_ok()) {
        return DataType::Float;
    }
    if cells().all(|c| parse_date(c).is_some()) {
        return DataType::Date;
    }
    DataType::text()
}

fn parse_date(cell: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .or_else(|_| chrono::NaiveDate::parse_from_str(cell, "%d/%m/%Y"))
        .ok()
}

/// Converts a raw cell per the column's inferred type.
/// Empty cells are null regardless of type.
fn parse_cell(raw: &str, data_type: &DataType) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match data_type {
        DataType::Integer => raw
            .parse::<i64>()
            .map_or_else(|_| Value::Text(raw.to_string()), Value::Integer),
        DataType::Float => raw
            .parse::<f64>()
            .map_or_else(|_| Value::Text(raw.to_string()), Value::Float),
        DataType::Date => parse_date(raw)
            .map_or_else(|| Value::Text(raw.to_string()), Value::Date),
        _ => Value::Text(raw.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_file(name: &str, content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_tab_delimited_with_inference() {
        let (_dir, path) = write_file(
            "data.txt",
            "Validity_Date\tDP_GROUP_MKT\tQTY\tRATE\n\
             2025-06-01\tANZ\t10\t0.5\n\
             2025-06-01\tEU\t\t1.25\n",
        );
        let result = read_delimited(&path).unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.columns()[0].data_type, DataType::Date);
        assert_eq!(result.columns()[1].data_type, DataType::text());
        assert_eq!(result.columns()[2].data_type, DataType::Integer);
        assert_eq!(result.columns()[3].data_type, DataType::Float);
        // Empty cell becomes null, not zero
        assert_eq!(result.rows()[1][2], Value::Null);
    }

    #[test]
    fn test_csv_extension_uses_comma() {
        let (_dir, path) = write_file("data.csv", "A,B\n1,x\n");
        let result = read_delimited(&path).unwrap();
        assert_eq!(result.column_names(), vec!["A", "B"]);
        assert_eq!(result.rows()[0][0], Value::Integer(1));
    }

    #[test]
    fn test_mixed_numeric_column_widens_to_float() {
        let (_dir, path) = write_file("data.csv", "V\n1\n2.5\n");
        let result = read_delimited(&path).unwrap();
        assert_eq!(result.columns()[0].data_type, DataType::Float);
        assert_eq!(result.rows()[0][0], Value::Float(1.0));
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let (_dir, path) = write_file("data.csv", "A,B\n1,2\n3\n");
        assert!(read_delimited(&path).is_err());
    }

    #[test]
    fn test_duplicate_header_is_rejected() {
        let (_dir, path) = write_file("data.csv", "A,a\n1,2\n");
        let err = read_delimited(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let (_dir, path) = write_file("data.xlsx", "A,B\n1,2\n");
        assert!(read_delimited(&path).is_err());
    }

    #[test]
    fn test_header_only_file_is_empty_result() {
        let (_dir, path) = write_file("data.csv", "A,B\n");
        let result = read_delimited(&path).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns().len(), 2);
    }
}
