//! End-to-end pipeline tests driven through the public `DatabaseClient`
//! seam with an in-memory database double.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::path::Path;

use chrono::NaiveDate;
use oraflow_core::pipeline::download::{self, DownloadOptions};
use oraflow_core::pipeline::upload::{self, UploadOutcome};
use oraflow_core::{
    AppConfig, Column, DataType, DatabaseClient, OraflowError, QueryErrorKind, Result,
    TableSchema, TabularResult, TargetColumn, Value,
};

/// Database double: one canned query result, one canned schema, and a
/// record of every row that reaches `insert_rows`.
#[derive(Default)]
struct InMemoryDb {
    forecast: Option<TabularResult>,
    schema: Option<TableSchema>,
    inserted: Vec<Vec<Value>>,
    pings: u32,
    fail_ping: bool,
    closed: bool,
}

impl DatabaseClient for InMemoryDb {
    fn query(&mut self, _sql: &str, _params: &[(String, Value)]) -> Result<TabularResult> {
        self.forecast
            .clone()
            .ok_or_else(|| OraflowError::query(QueryErrorKind::Unknown, "no forecast loaded"))
    }

    fn table_schema(&mut self, _table: &str) -> Result<TableSchema> {
        self.schema
            .clone()
            .ok_or_else(|| OraflowError::query(QueryErrorKind::Unknown, "no schema loaded"))
    }

    fn insert_rows(
        &mut self,
        _table: &str,
        _columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        self.inserted.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    fn ping(&mut self) -> Result<()> {
        self.pings += 1;
        if self.fail_ping {
            return Err(OraflowError::connection(
                oraflow_core::ConnectionErrorKind::Network,
                "connection lost",
            ));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn forecast_rows() -> TabularResult {
    let mut result = TabularResult::new(vec![
        Column::new("VALIDITY_DATE", DataType::Date),
        Column::new("DP_GROUP_MKT", DataType::text()),
        Column::new("QTY", DataType::Integer),
    ]);
    let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
    for (group, qty) in [("ANZ", 5), ("EU", 7), ("NA", 9), ("EU", 11)] {
        result
            .push_row(vec![
                Value::Date(date),
                Value::Text(group.to_string()),
                Value::Integer(qty),
            ])
            .unwrap();
    }
    result
}

fn consolidation_schema() -> TableSchema {
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
                name: "DP_GROUP_MKT".to_string(),
                data_type: DataType::Text {
                    max_length: Some(30),
                },
                nullable: true,
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

#[test]
fn download_writes_grouped_workbooks_and_parquet_mirror() {
    let base = tempfile::tempdir().unwrap();
    let config = AppConfig::default();
    let mut db = InMemoryDb {
        forecast: Some(forecast_rows()),
        ..InMemoryDb::default()
    };

    let outcome = download::download_forecast(
        &config,
        &mut db,
        DownloadOptions::default(),
        base.path(),
    )
    .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.row_count, 4);
    // Connection health is verified before the query runs
    assert_eq!(db.pings, 1);
    // Three distinct markets, one workbook each
    assert_eq!(outcome.excel_files.len(), 3);
    assert_eq!(outcome.parquet_files.len(), 1);

    let folder_name = outcome.folder.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(
        folder_name,
        "BOM EO Forecast Snapshot on 03_FEB_25 for March Forecast Cycle"
    );
    for path in outcome.excel_files.iter().chain(&outcome.parquet_files) {
        assert!(path.exists(), "missing output {}", path.display());
        assert!(std::fs::metadata(path).unwrap().len() > 0);
    }
}

#[test]
fn upload_round_trip_renames_validates_and_loads() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("consolidated.txt");
    std::fs::write(
        &file,
        "Validity_Date\tDP_GROUP_MKT\tQTY\n\
         2025-02-03\tANZ\t5\n\
         2025-02-03\tEU\t7\n\
         2025-02-03\tNA\t\n",
    )
    .unwrap();

    let config = AppConfig::default();
    let mut db = InMemoryDb {
        schema: Some(consolidation_schema()),
        ..InMemoryDb::default()
    };

    let outcome = upload::upload_file(&config, &mut db, &file, None).unwrap();
    let summary = match outcome {
        UploadOutcome::Loaded(summary) => summary,
        UploadOutcome::Rejected(report) => panic!("unexpected rejection:\n{report}"),
    };
    assert!(summary.is_complete());
    assert_eq!(summary.rows_committed, 3);
    assert_eq!(db.pings, 1);
    assert_eq!(db.inserted.len(), 3);
    // Empty QTY cell must arrive as null
    assert_eq!(db.inserted[2][2], Value::Null);
}

#[test]
fn upload_aborts_when_the_health_check_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("consolidated.txt");
    std::fs::write(&file, "Validity_Date\tQTY\n2025-02-03\t5\n").unwrap();

    let config = AppConfig::default();
    let mut db = InMemoryDb {
        schema: Some(consolidation_schema()),
        fail_ping: true,
        ..InMemoryDb::default()
    };

    let result = upload::upload_file(&config, &mut db, &file, None);
    assert!(result.is_err());
    assert!(db.inserted.is_empty());
}

#[test]
fn upload_with_unknown_column_is_rejected_before_any_insert() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("consolidated.txt");
    std::fs::write(
        &file,
        "Validity_Date\tDP_GROUP_MKT\tQTY\tNOTES\n2025-02-03\tANZ\t5\thello\n",
    )
    .unwrap();

    let config = AppConfig::default();
    let mut db = InMemoryDb {
        schema: Some(consolidation_schema()),
        ..InMemoryDb::default()
    };

    let outcome = upload::upload_file(&config, &mut db, &file, None).unwrap();
    match outcome {
        UploadOutcome::Rejected(report) => {
            assert!(report.is_blocking());
            assert!(report.to_string().contains("NOTES"));
        }
        UploadOutcome::Loaded(_) => panic!("file with an unknown column must not load"),
    }
    assert!(db.inserted.is_empty());
}

#[test]
fn excel_only_download_writes_no_parquet_directory() {
    let base = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.output.group_column = None;
    let mut db = InMemoryDb {
        forecast: Some(forecast_rows()),
        ..InMemoryDb::default()
    };

    let options = DownloadOptions {
        excel: true,
        parquet: false,
    };
    let outcome = download::download_forecast(&config, &mut db, options, base.path()).unwrap();
    assert_eq!(outcome.excel_files.len(), 1);
    assert!(outcome.parquet_files.is_empty());
    assert!(!Path::new(&outcome.folder).join("parquet").exists());
}
