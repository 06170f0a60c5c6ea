//! Forecast download pipeline.
//!
//! Runs the forecast query, derives the snapshot folder name from the
//! validity date found in the data, and writes one Excel workbook per
//! market group plus a Parquet mirror. A single failed file write is
//! recorded and reported, not fatal: the remaining outputs are still
//! produced so a re-run only has to cover the gap.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::DatabaseClient;
use crate::error::OraflowError;
use crate::io::{excel, parquet};
use crate::models::{TabularResult, Value};
use crate::query;
use crate::Result;

/// Which output formats a download run produces.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub excel: bool,
    pub parquet: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            excel: true,
            parquet: true,
        }
    }
}

/// What a download run produced.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Snapshot folder all outputs were written into
    pub folder: PathBuf,
    pub row_count: usize,
    pub excel_files: Vec<PathBuf>,
    pub parquet_files: Vec<PathBuf>,
    /// Paths that failed to write, with the error text
    pub writer_failures: Vec<(PathBuf, String)>,
    /// Distribution URL to surface to the operator, when configured
    pub drive_url: Option<String>,
}

impl DownloadOutcome {
    pub fn is_complete(&self) -> bool {
        self.writer_failures.is_empty()
    }
}

/// Runs the forecast query and writes the snapshot under `base_dir`.
/// The connection is health-checked before the query is sent.
///
/// # Errors
/// Connection, query, and folder-creation failures abort the run;
/// individual file write failures are collected in the outcome instead.
pub fn download_forecast(
    config: &AppConfig,
    client: &mut dyn DatabaseClient,
    options: DownloadOptions,
    base_dir: &Path,
) -> Result<DownloadOutcome> {
    client.ping()?;
    let sql = config.query("forecast")?;
    let result = query::run(client, sql, &[])?;
    if result.is_empty() {
        warn!("Forecast query returned no rows; writing an empty snapshot");
    }

    let validity = validity_date(&result);
    let folder = base_dir.join(snapshot_folder_name(&config.output.prefix, validity));
    std::fs::create_dir_all(&folder)
        .map_err(|e| OraflowError::io(format!("creating {}", folder.display()), e))?;
    info!("Writing snapshot to {}", folder.display());

    let mut outcome = DownloadOutcome {
        folder: folder.clone(),
        row_count: result.row_count(),
        excel_files: Vec::new(),
        parquet_files: Vec::new(),
        writer_failures: Vec::new(),
        drive_url: config.output.drive_url.clone(),
    };

    if options.excel {
        write_excel_outputs(config, &result, &folder, &mut outcome);
    }
    if options.parquet {
        let parquet_dir = folder.join("parquet");
        std::fs::create_dir_all(&parquet_dir)
            .map_err(|e| OraflowError::io(format!("creating {}", parquet_dir.display()), e))?;
        let path = parquet_dir.join(format!("{}.parquet", config.output.prefix));
        record(
            parquet::write_parquet(&result, &path),
            path,
            &mut outcome.parquet_files,
            &mut outcome.writer_failures,
        );
    }

    info!(
        "Snapshot done: {} rows, {} workbooks, {} parquet files, {} failures",
        outcome.row_count,
        outcome.excel_files.len(),
        outcome.parquet_files.len(),
        outcome.writer_failures.len()
    );
    Ok(outcome)
}

/// One workbook per distinct group value, or a single workbook when no
/// group column is configured or present.
fn write_excel_outputs(
    config: &AppConfig,
    result: &TabularResult,
    folder: &Path,
    outcome: &mut DownloadOutcome,
) {
    let groups = config
        .output
        .group_column
        .as_deref()
        .map(|column| result.distinct_values(column))
        .unwrap_or_default();

    if groups.is_empty() {
        let path = folder.join(format!("{}.xlsx", config.output.prefix));
        record(
            excel::write_workbook(result, &path),
            path,
            &mut outcome.excel_files,
            &mut outcome.writer_failures,
        );
        return;
    }

    // group_column is Some here, or groups would be empty
    let column = config.output.group_column.as_deref().unwrap_or_default();
    for group in groups {
        let subset = result.filter_by(column, &group);
        let path = folder.join(format!("{} {}.xlsx", config.output.prefix, safe_name(&group)));
        record(
            excel::write_workbook(&subset, &path),
            path,
            &mut outcome.excel_files,
            &mut outcome.writer_failures,
        );
    }
}

fn record(
    outcome: Result<()>,
    path: PathBuf,
    written: &mut Vec<PathBuf>,
    failures: &mut Vec<(PathBuf, String)>,
) {
    match outcome {
        Ok(()) => written.push(path),
        Err(e) => {
            error!("Failed to write {}: {e}", path.display());
            failures.push((path, e.to_string()));
        }
    }
}

/// First validity date found in the result, if any.
fn validity_date(result: &TabularResult) -> Option<NaiveDate> {
    match result.first_value("VALIDITY_DATE") {
        Some(Value::Date(d)) => Some(*d),
        Some(Value::Timestamp(t)) => Some(t.date()),
        Some(Value::Text(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        _ => None,
    }
}

/// Folder name for one snapshot, built from the data's validity date.
///
/// The forecast cycle is the month after the validity date; a December
/// snapshot belongs to the January cycle of the following year.
fn snapshot_folder_name(prefix: &str, validity: Option<NaiveDate>) -> String {
    let Some(date) = validity else {
        return format!("{prefix} Snapshot (no validity date)");
    };
    let label = date.format("%d_%b_%y").to_string().to_uppercase();
    let cycle = next_month(date).format("%B").to_string();
    format!("{prefix} Snapshot on {label} for {cycle} Forecast Cycle")
}

fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Strips path-hostile characters from a group value before it becomes
/// part of a file name.
fn safe_name(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}
