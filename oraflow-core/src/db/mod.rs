//! Database access layer.
//!
//! The [`DatabaseClient`] trait is the seam between the pipelines and the
//! Oracle driver: the query executor, schema validator feed, and bulk
//! loader all speak to it, so everything above the driver is testable with
//! an in-memory fake. The Oracle implementation is feature-gated behind
//! `oracle` (default on).

pub mod connection;
pub mod driver;

#[cfg(feature = "oracle")]
pub mod oracle;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::OraflowError;
use crate::models::{DataType, TableSchema, TabularResult, Value};
use crate::Result;

/// Bounded retry with exponential backoff for transient network failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total connect attempts (first try included)
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Immutable per-run connection configuration.
///
/// # Security
/// Holds no credentials; those are resolved separately and passed to
/// `connect` by reference.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// EZConnect descriptor or TNS alias of the target instance
    pub descriptor: String,
    /// Ordered Oracle client library search paths; first existing wins
    pub driver_paths: Vec<PathBuf>,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Retry budget for network failures
    pub retry: RetryPolicy,
}

/// Synchronous database operations used by the two pipelines.
///
/// Implementations own exactly one connection; `close` is idempotent and is
/// also invoked on drop so every pipeline exit path releases the
/// connection.
pub trait DatabaseClient {
    /// Runs a parameterized query and materializes the result.
    /// Parameters are bound by name, never interpolated.
    fn query(&mut self, sql: &str, params: &[(String, Value)]) -> Result<TabularResult>;

    /// Reads the column layout of a target table from the data dictionary.
    fn table_schema(&mut self, table: &str) -> Result<TableSchema>;

    /// Inserts the given rows inside a single transaction.
    /// On failure the transaction is rolled back and nothing is committed.
    fn insert_rows(&mut self, table: &str, columns: &[String], rows: &[Vec<Value>])
        -> Result<u64>;

    /// Cheap connection health check.
    fn ping(&mut self) -> Result<()>;

    /// Releases the connection. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// Rejects identifiers that cannot be interpolated safely into SQL.
///
/// Identifiers (table and column names) cannot be bound as parameters, so
/// anything outside the unquoted Oracle identifier grammar is refused
/// outright. One schema qualifier is allowed.
///
/// # Errors
/// Returns a configuration error naming the offending identifier.
pub fn ensure_safe_identifier(name: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
    };
    let mut parts = name.split('.');
    let safe = match (parts.next(), parts.next(), parts.next()) {
        (Some(table), None, _) => valid_part(table),
        (Some(schema), Some(table), None) => valid_part(schema) && valid_part(table),
        _ => false,
    };
    if safe {
        Ok(())
    } else {
        Err(OraflowError::configuration(format!(
            "unsafe SQL identifier: '{name}'"
        )))
    }
}

/// Maps an Oracle data dictionary type name to the unified type system.
///
/// `NUMBER` columns with scale 0 are whole numbers; everything else numeric
/// is a float. `DATE` carries time-of-day in Oracle and maps to timestamp.
pub fn map_dictionary_type(
    type_name: &str,
    precision: Option<i64>,
    scale: Option<i64>,
) -> DataType {
    let upper = type_name.to_uppercase();
    match upper.as_str() {
        "VARCHAR2" | "NVARCHAR2" | "CHAR" | "NCHAR" => DataType::Text {
            max_length: precision.and_then(|p| u32::try_from(p).ok()),
        },
        "CLOB" | "NCLOB" | "LONG" => DataType::text(),
        "NUMBER" => match (precision, scale) {
            (Some(p), Some(0)) if p > 0 => DataType::Integer,
            _ => DataType::Float,
        },
        "FLOAT" | "BINARY_FLOAT" | "BINARY_DOUBLE" => DataType::Float,
        "DATE" => DataType::Timestamp,
        "RAW" | "LONG RAW" | "BLOB" => DataType::Binary,
        _ if upper.starts_with("TIMESTAMP") => DataType::Timestamp,
        _ => DataType::Other {
            type_name: upper.clone(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! In-memory fake client for pipeline, loader, and executor tests.

    use super::*;
    use crate::error::QueryErrorKind;

    #[derive(Default)]
    pub(crate) struct FakeClient {
        pub query_result: Option<TabularResult>,
        pub schema: Option<TableSchema>,
        /// 1-based insert call numbers that should fail
        pub failing_batches: Vec<usize>,
        pub insert_calls: usize,
        pub inserted_rows: Vec<Vec<Value>>,
        pub ping_calls: u32,
        pub close_calls: u32,
    }

    impl DatabaseClient for FakeClient {
        fn query(&mut self, _sql: &str, _params: &[(String, Value)]) -> Result<TabularResult> {
            self.query_result
                .clone()
                .ok_or_else(|| OraflowError::query(QueryErrorKind::Unknown, "no canned result"))
        }

        fn table_schema(&mut self, _table: &str) -> Result<TableSchema> {
            self.schema
                .clone()
                .ok_or_else(|| OraflowError::query(QueryErrorKind::Unknown, "no canned schema"))
        }

        fn insert_rows(
            &mut self,
            _table: &str,
            _columns: &[String],
            rows: &[Vec<Value>],
        ) -> Result<u64> {
            self.insert_calls += 1;
            if self.failing_batches.contains(&self.insert_calls) {
                return Err(OraflowError::load(format!(
                    "ORA-01400: cannot insert NULL (simulated, call {})",
                    self.insert_calls
                )));
            }
            self.inserted_rows.extend(rows.iter().cloned());
            Ok(rows.len() as u64)
        }

        fn ping(&mut self) -> Result<()> {
            self.ping_calls += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.close_calls += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_identifiers() {
        assert!(ensure_safe_identifier("t_ibp_cons_rdc").is_ok());
        assert!(ensure_safe_identifier("network_rw.bomfc_dpv_detail_hist").is_ok());
        assert!(ensure_safe_identifier("COL_1$#").is_ok());
    }

    #[test]
    fn test_unsafe_identifiers_rejected() {
        assert!(ensure_safe_identifier("t; DROP TABLE x").is_err());
        assert!(ensure_safe_identifier("").is_err());
        assert!(ensure_safe_identifier("1leading_digit").is_err());
        assert!(ensure_safe_identifier("a.b.c").is_err());
        assert!(ensure_safe_identifier("tab le").is_err());
        assert!(ensure_safe_identifier("x'--").is_err());
    }

    #[test]
    fn test_dictionary_type_mapping() {
        assert_eq!(
            map_dictionary_type("VARCHAR2", Some(64), None),
            DataType::Text {
                max_length: Some(64)
            }
        );
        assert_eq!(map_dictionary_type("NUMBER", Some(10), Some(0)), DataType::Integer);
        assert_eq!(map_dictionary_type("NUMBER", Some(10), Some(2)), DataType::Float);
        assert_eq!(map_dictionary_type("NUMBER", None, None), DataType::Float);
        assert_eq!(map_dictionary_type("DATE", None, None), DataType::Timestamp);
        assert_eq!(
            map_dictionary_type("TIMESTAMP(6)", None, None),
            DataType::Timestamp
        );
        assert_eq!(map_dictionary_type("BLOB", None, None), DataType::Binary);
        assert_eq!(
            map_dictionary_type("SDO_GEOMETRY", None, None),
            DataType::Other {
                type_name: "SDO_GEOMETRY".to_string()
            }
        );
    }
}
