//! Batched bulk loading with partial-failure accounting.
//!
//! Rows are split into fixed-size batches and each batch is one
//! transaction. A failed batch rolls back alone; later batches still run
//! unless `stop_on_first_error` is set. The summary reports exactly what
//! was committed so the operator can re-run with a trimmed file instead of
//! guessing.

use tracing::{error, info};

use crate::db::DatabaseClient;
use crate::models::Value;
use crate::Result;

/// Outcome of one bulk load.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    /// Rows handed to the driver, failed batches included
    pub rows_attempted: u64,
    /// Rows durably committed
    pub rows_committed: u64,
    pub batches_failed: u32,
    /// The error text of the first batch that failed, if any
    pub first_failure: Option<String>,
}

impl LoadSummary {
    pub fn is_complete(&self) -> bool {
        self.batches_failed == 0
    }
}

/// Splits rows into batches and drives them through the client.
#[derive(Debug, Clone)]
pub struct BulkLoader {
    batch_size: usize,
    stop_on_first_error: bool,
}

impl BulkLoader {
    /// A zero batch size would loop forever, so it is clamped to one row
    /// per batch.
    pub fn new(batch_size: usize, stop_on_first_error: bool) -> Self {
        Self {
            batch_size: batch_size.max(1),
            stop_on_first_error,
        }
    }

    /// Loads `rows` into `table`, preserving file order across batches.
    ///
    /// # Errors
    /// Only infrastructure errors (a lost connection) propagate as `Err`;
    /// per-batch insert failures are recorded in the summary instead.
    pub fn load(
        &self,
        client: &mut dyn DatabaseClient,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<LoadSummary> {
        let mut summary = LoadSummary {
            rows_attempted: 0,
            rows_committed: 0,
            batches_failed: 0,
            first_failure: None,
        };

        for (index, batch) in rows.chunks(self.batch_size).enumerate() {
            summary.rows_attempted += batch.len() as u64;
            match client.insert_rows(table, columns, batch) {
                Ok(committed) => summary.rows_committed += committed,
                Err(e) => {
                    error!("Batch {} failed ({} rows): {e}", index + 1, batch.len());
                    summary.batches_failed += 1;
                    summary.first_failure.get_or_insert_with(|| e.to_string());
                    if self.stop_on_first_error {
                        break;
                    }
                }
            }
        }

        info!(
            "Load into {table}: {}/{} rows committed, {} failed batches",
            summary.rows_committed, summary.rows_attempted, summary.batches_failed
        );
        Ok(summary)
    }
}
