//! Oracle driver adapter.
//!
//! Implements [`DatabaseClient`] on top of the `oracle` crate. Errors
//! coming back from the driver are classified into the connection and query
//! taxonomies by their ORA/DPI codes so the callers' recovery policies can
//! act on them. Connect strings and credentials never leak into error text.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{NaiveDate, NaiveDateTime};
use oracle::sql_type::{OracleType, ToSql};
use oracle::Row;
use tracing::debug;

use super::{ensure_safe_identifier, map_dictionary_type, ConnectionConfig, DatabaseClient};
use crate::error::{redact_connect_string, ConnectionErrorKind, OraflowError, QueryErrorKind};
use crate::credentials::Credentials;
use crate::models::{Column, DataType, TableSchema, TabularResult, TargetColumn, Value};
use crate::Result;

/// One exclusively-owned Oracle connection.
///
/// `close` is idempotent; `Drop` closes as a backstop so the connection is
/// released on every pipeline exit path, including error unwinds.
pub struct OracleClient {
    conn: Option<oracle::Connection>,
}

impl OracleClient {
    /// Opens a connection, classifying any failure.
    ///
    /// # Errors
    /// `Connection` with `Authentication`, `Network`, `DriverNotFound`
    /// (client library present on disk but not loadable), or `Other`.
    pub fn connect(credentials: &Credentials, config: &ConnectionConfig) -> Result<Self> {
        debug!(
            "Opening connection to {} as {}",
            redact_connect_string(&credentials.dsn),
            credentials.username
        );
        let dsn = with_connect_timeout(&credentials.dsn, config.connect_timeout);
        let conn = oracle::Connection::connect(&credentials.username, &credentials.password, &dsn)
            .map_err(|e| {
                OraflowError::connection(
                    classify_connect_error(&e),
                    format!(
                        "connecting to {}: {e}",
                        redact_connect_string(&config.descriptor)
                    ),
                )
            })?;
        // Bound every later round trip by the same budget; an expired call
        // timeout comes back as DPI-1067 and classifies as a query timeout
        conn.set_call_timeout(Some(config.connect_timeout)).map_err(|e| {
            OraflowError::connection(
                ConnectionErrorKind::Other,
                format!("applying call timeout: {e}"),
            )
        })?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&oracle::Connection> {
        self.conn.as_ref().ok_or_else(|| {
            OraflowError::connection(ConnectionErrorKind::Other, "connection already closed")
        })
    }
}

impl DatabaseClient for OracleClient {
    fn query(&mut self, sql: &str, params: &[(String, Value)]) -> Result<TabularResult> {
        let conn = self.conn()?;

        let bound: Vec<Box<dyn ToSql>> = params.iter().map(|(_, v)| value_to_sql(v)).collect();
        let named: Vec<(&str, &dyn ToSql)> = params
            .iter()
            .zip(bound.iter())
            .map(|((name, _), boxed)| (name.as_str(), boxed.as_ref()))
            .collect();

        let mut rows = if named.is_empty() {
            conn.query(sql, &[])
        } else {
            conn.query_named(sql, &named)
        }
        .map_err(|e| query_error(&e, "executing query"))?;

        let columns: Vec<Column> = rows
            .column_info()
            .iter()
            .map(|info| Column::new(info.name(), map_column_type(info.oracle_type())))
            .collect();
        let mut result = TabularResult::new(columns);

        for row in rows.by_ref() {
            let row = row.map_err(|e| query_error(&e, "fetching row"))?;
            let mut values = Vec::with_capacity(result.columns().len());
            for (idx, column) in result.columns().iter().enumerate() {
                values.push(read_value(&row, idx, &column.data_type)?);
            }
            result.push_row(values)?;
        }

        debug!(
            "Query returned {} rows, {} columns",
            result.row_count(),
            result.columns().len()
        );
        Ok(result)
    }

    fn table_schema(&mut self, table: &str) -> Result<TableSchema> {
        ensure_safe_identifier(table)?;
        let conn = self.conn()?;

        let (owner, table_name) = match table.split_once('.') {
            Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
            None => (None, table.to_string()),
        };

        let sql = "SELECT column_name, data_type, data_precision, data_scale, \
                          char_length, nullable, data_default \
                   FROM all_tab_columns \
                   WHERE table_name = UPPER(:tab) \
                     AND (:own IS NULL OR owner = UPPER(:own)) \
                   ORDER BY column_id";
        let rows = conn
            .query_named(sql, &[("tab", &table_name), ("own", &owner)])
            .map_err(|e| query_error(&e, "reading table schema"))?;

        let mut columns = Vec::new();
        for row in rows {
            let row = row.map_err(|e| query_error(&e, "reading table schema"))?;
            let name: String = get_column(&row, 0)?;
            let type_name: String = get_column(&row, 1)?;
            let precision: Option<i64> = get_column(&row, 2)?;
            let scale: Option<i64> = get_column(&row, 3)?;
            let char_length: Option<i64> = get_column(&row, 4)?;
            let nullable: String = get_column(&row, 5)?;
            let default: Option<String> = get_column(&row, 6)?;

            let length_hint = precision.or(char_length.filter(|l| *l > 0));
            columns.push(TargetColumn {
                name,
                data_type: map_dictionary_type(&type_name, length_hint, scale),
                nullable: nullable == "Y",
                has_default: default.map(|d| !d.trim().is_empty()).unwrap_or(false),
            });
        }

        if columns.is_empty() {
            return Err(OraflowError::query(
                QueryErrorKind::Permission,
                format!("table '{table}' has no visible columns (missing table or privilege)"),
            ));
        }
        Ok(TableSchema {
            table: table.to_string(),
            columns,
        })
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        ensure_safe_identifier(table)?;
        for column in columns {
            ensure_safe_identifier(column)?;
        }
        let conn = self.conn()?;

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!(":{i}")).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut stmt = conn
            .statement(&sql)
            .build()
            .map_err(|e| OraflowError::load(format!("preparing insert into {table}: {e}")))?;

        for row in rows {
            let bound: Vec<Box<dyn ToSql>> = row.iter().map(value_to_sql).collect();
            let refs: Vec<&dyn ToSql> = bound.iter().map(AsRef::as_ref).collect();
            if let Err(e) = stmt.execute(&refs) {
                let _ = conn.rollback();
                return Err(OraflowError::load(format!("insert into {table}: {e}")));
            }
        }

        conn.commit().map_err(|e| {
            let _ = conn.rollback();
            OraflowError::load(format!("committing batch into {table}: {e}"))
        })?;
        Ok(rows.len() as u64)
    }

    fn ping(&mut self) -> Result<()> {
        self.conn()?
            .query_row_as::<i64>("SELECT 1 FROM dual", &[])
            .map(|_| ())
            .map_err(|e| OraflowError::connection(ConnectionErrorKind::Network, e.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            // "already closed" from the server side is not a failure here
            if let Err(e) = conn.close() {
                debug!("Closing connection: {e}");
            }
        }
        Ok(())
    }
}

impl Drop for OracleClient {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Maps a driver-reported column type to the unified type system.
/// Oracle `DATE` carries time-of-day and maps to timestamp.
fn map_column_type(oracle_type: &OracleType) -> DataType {
    match oracle_type {
        OracleType::Varchar2(n)
        | OracleType::NVarchar2(n)
        | OracleType::Char(n)
        | OracleType::NChar(n) => DataType::Text {
            max_length: Some(*n),
        },
        OracleType::CLOB | OracleType::NCLOB | OracleType::Long | OracleType::Rowid => {
            DataType::text()
        }
        OracleType::Number(precision, scale) => {
            if *scale == 0 && *precision > 0 && *precision <= 18 {
                DataType::Integer
            } else {
                DataType::Float
            }
        }
        OracleType::Int64 | OracleType::UInt64 => DataType::Integer,
        OracleType::Float(_) | OracleType::BinaryFloat | OracleType::BinaryDouble => {
            DataType::Float
        }
        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => DataType::Timestamp,
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => DataType::Binary,
        OracleType::Boolean => DataType::Boolean,
        other => DataType::Other {
            type_name: other.to_string(),
        },
    }
}

/// Reads one cell, honoring the column's unified type.
/// Binary data is carried as base64 text.
fn read_value(row: &Row, idx: usize, data_type: &DataType) -> Result<Value> {
    let value = match data_type {
        DataType::Integer => get_cell::<Option<i64>>(row, idx)?.map(Value::Integer),
        DataType::Float => get_cell::<Option<f64>>(row, idx)?.map(Value::Float),
        DataType::Boolean => get_cell::<Option<bool>>(row, idx)?.map(Value::Boolean),
        DataType::Date => get_cell::<Option<NaiveDate>>(row, idx)?.map(Value::Date),
        DataType::Timestamp => get_cell::<Option<NaiveDateTime>>(row, idx)?.map(Value::Timestamp),
        DataType::Binary => {
            get_cell::<Option<Vec<u8>>>(row, idx)?.map(|b| Value::Text(BASE64.encode(b)))
        }
        DataType::Text { .. } | DataType::Other { .. } => {
            get_cell::<Option<String>>(row, idx)?.map(Value::Text)
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn get_cell<T: oracle::sql_type::FromSql>(row: &Row, idx: usize) -> Result<T> {
    row.get::<usize, T>(idx)
        .map_err(|e| query_error(&e, "decoding column value"))
}

fn get_column<T: oracle::sql_type::FromSql>(row: &Row, idx: usize) -> Result<T> {
    row.get::<usize, T>(idx)
        .map_err(|e| query_error(&e, "decoding dictionary row"))
}

/// Converts a cell to a bindable SQL value. Booleans become 0/1 since the
/// target dialect predates native boolean columns.
fn value_to_sql(value: &Value) -> Box<dyn ToSql> {
    match value {
        Value::Null => Box::new(None::<String>),
        Value::Integer(v) => Box::new(*v),
        Value::Float(v) => Box::new(*v),
        Value::Text(v) => Box::new(v.clone()),
        Value::Boolean(v) => Box::new(i64::from(*v)),
        Value::Date(v) => Box::new(*v),
        Value::Timestamp(v) => Box::new(*v),
    }
}

/// Appends the EZConnect `connect_timeout` parameter so a dead listener
/// fails within the configured budget instead of hanging on TCP. TNS
/// aliases and descriptors that already carry parameters are left alone.
fn with_connect_timeout(dsn: &str, timeout: Duration) -> String {
    if dsn.starts_with("//") && !dsn.contains('?') {
        format!("{dsn}?connect_timeout={}", timeout.as_secs())
    } else {
        dsn.to_string()
    }
}

fn query_error(e: &oracle::Error, context: &str) -> OraflowError {
    OraflowError::query(classify_query_text(&e.to_string()), format!("{context}: {e}"))
}

fn classify_connect_error(e: &oracle::Error) -> ConnectionErrorKind {
    classify_connect_text(&e.to_string())
}

fn classify_connect_text(text: &str) -> ConnectionErrorKind {
    if text.contains("DPI-1047") {
        // Client library directory exists but the library would not load
        return ConnectionErrorKind::DriverNotFound;
    }
    const AUTH: [&str; 4] = ["ORA-01017", "ORA-28000", "ORA-28001", "ORA-01045"];
    if AUTH.iter().any(|code| text.contains(code)) {
        return ConnectionErrorKind::Authentication;
    }
    const NETWORK: [&str; 9] = [
        "ORA-12154", "ORA-12170", "ORA-12514", "ORA-12535", "ORA-12541", "ORA-12543",
        "ORA-12545", "ORA-03113", "ORA-03114",
    ];
    if NETWORK.iter().any(|code| text.contains(code)) {
        return ConnectionErrorKind::Network;
    }
    ConnectionErrorKind::Other
}

fn classify_query_text(text: &str) -> QueryErrorKind {
    if text.contains("ORA-01013") || text.contains("ORA-12170") || text.contains("DPI-1067") {
        return QueryErrorKind::Timeout;
    }
    if text.contains("ORA-01031") || text.contains("ORA-00942") || text.contains("ORA-01950") {
        return QueryErrorKind::Permission;
    }
    const SYNTAX: [&str; 7] = [
        "ORA-00900", "ORA-00904", "ORA-00907", "ORA-00911", "ORA-00920", "ORA-00933",
        "ORA-00936",
    ];
    if SYNTAX.iter().any(|code| text.contains(code)) {
        return QueryErrorKind::Syntax;
    }
    QueryErrorKind::Unknown
}
