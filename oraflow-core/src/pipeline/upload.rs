//! File upload pipeline.
//!
//! Reads a delimited file, applies the configured header renames, validates
//! the columns against the target table's dictionary schema, and only then
//! hands the rows to the bulk loader. A blocking validation finding rejects
//! the file before a single row reaches the database.

use std::path::Path;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::DatabaseClient;
use crate::io::reader;
use crate::loader::{BulkLoader, LoadSummary};
use crate::models::Value;
use crate::validation::{self, ValidationReport};
use crate::Result;

/// Result of an upload run.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Validation found a blocking problem; nothing was loaded
    Rejected(ValidationReport),
    /// The load ran; the summary says how much of it committed
    Loaded(LoadSummary),
}

/// Uploads one file into `table` (or the configured default table).
/// The connection is health-checked before anything is read or loaded.
///
/// # Errors
/// Connection failures, file parsing, and dictionary lookups propagate as
/// errors; validation rejections and partial load failures are reported in
/// the outcome.
pub fn upload_file(
    config: &AppConfig,
    client: &mut dyn DatabaseClient,
    path: &Path,
    table: Option<&str>,
) -> Result<UploadOutcome> {
    let table = table.unwrap_or(&config.upload.default_table);
    info!("Uploading {} into {table}", path.display());

    client.ping()?;
    let mut data = reader::read_delimited(path)?;
    data.rename_columns(&config.rename_pairs());

    let schema = client.table_schema(table)?;
    let report = validation::validate(data.columns(), &schema);
    if report.is_blocking() {
        warn!("Rejected {} before loading:\n{report}", path.display());
        return Ok(UploadOutcome::Rejected(report));
    }

    // Project rows down to the matched columns, in file order
    let matched = report.matched_columns();
    let indices: Vec<usize> = matched
        .iter()
        .filter_map(|name| data.column_index(name))
        .collect();
    let rows: Vec<Vec<Value>> = data
        .rows()
        .iter()
        .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
        .collect();

    let loader = BulkLoader::new(config.upload.batch_size, config.upload.stop_on_first_error);
    let summary = loader.load(client, table, &matched, &rows)?;
    Ok(UploadOutcome::Loaded(summary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::db::testing::FakeClient;
    use crate::models::{DataType, TableSchema, TargetColumn};
    use std::io::Write as _;

    fn schema() -> TableSchema {
        TableSchema {
            table: "t_ibp_cons_rdc".to_string(),
            columns: vec![
                TargetColumn {
                    name: "VALIDITY_DATE".to_string(),
                    data_type: DataType::Timestamp,
                    nullable: false,
                    has_default: false,
                },
                TargetColumn {
                    name: "QTY".to_string(),
                    data_type: DataType::Float,
                    nullable: true,
                    has_default: false,
                },
            ],
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_valid_file_loads_with_renamed_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "upload.txt",
            "Validity_Date\tQTY\n2025-06-01\t10\n2025-06-01\t20\n",
        );
        let config = AppConfig::default();
        let mut client = FakeClient {
            schema: Some(schema()),
            ..FakeClient::default()
        };
        let outcome = upload_file(&config, &mut client, &path, None).unwrap();
        match outcome {
            UploadOutcome::Loaded(summary) => {
                assert!(summary.is_complete());
                assert_eq!(summary.rows_committed, 2);
            }
            UploadOutcome::Rejected(report) => panic!("unexpected rejection:\n{report}"),
        }
        assert_eq!(client.inserted_rows.len(), 2);
    }

    #[test]
    fn test_extra_column_rejects_before_any_insert() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "upload.txt",
            "Validity_Date\tQTY\tCOMMENT\n2025-06-01\t10\tx\n",
        );
        let config = AppConfig::default();
        let mut client = FakeClient {
            schema: Some(schema()),
            ..FakeClient::default()
        };
        let outcome = upload_file(&config, &mut client, &path, None).unwrap();
        match outcome {
            UploadOutcome::Rejected(report) => assert!(report.is_blocking()),
            UploadOutcome::Loaded(_) => panic!("blocking file must not load"),
        }
        assert_eq!(client.insert_calls, 0);
        assert!(client.inserted_rows.is_empty());
    }

    #[test]
    fn test_explicit_table_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "upload.txt", "Validity_Date\tQTY\n2025-06-01\t10\n");
        let config = AppConfig::default();
        let mut client = FakeClient {
            schema: Some(schema()),
            ..FakeClient::default()
        };
        let outcome = upload_file(&config, &mut client, &path, Some("t_other")).unwrap();
        assert!(matches!(outcome, UploadOutcome::Loaded(_)));
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let config = AppConfig::default();
        let mut client = FakeClient::default();
        let result = upload_file(
            &config,
            &mut client,
            Path::new("/nonexistent/upload.txt"),
            None,
        );
        assert!(result.is_err());
    }
}
