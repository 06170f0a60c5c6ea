//! Core data models for tabular data moving between Oracle and local files.
//!
//! This module defines the unified column types, cell values, and the
//! in-memory tabular structure shared by the query executor, the file
//! readers, the schema validator, and the bulk loader.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Unified column type across the Oracle dialect and file-sniffed inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Character data with optional declared length
    Text { max_length: Option<u32> },
    /// Whole numbers (Oracle NUMBER with scale 0, file integers)
    Integer,
    /// Fractional numbers (Oracle NUMBER with scale, FLOAT, BINARY_DOUBLE)
    Float,
    /// Boolean flags (file inputs only; stored as 0/1 on the Oracle side)
    Boolean,
    /// Calendar date without time-of-day
    Date,
    /// Date and time-of-day
    Timestamp,
    /// Raw binary data
    Binary,
    /// Database-specific types with no unified equivalent
    Other { type_name: String },
}

impl DataType {
    /// Plain text with no declared length limit.
    pub fn text() -> Self {
        Self::Text { max_length: None }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { max_length: Some(n) } => write!(f, "text({n})"),
            Self::Text { max_length: None } => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Binary => write!(f, "binary"),
            Self::Other { type_name } => write!(f, "other({type_name})"),
        }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Whether this cell carries no value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value the way it should appear in a text cell.
    /// Null renders as the empty string.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.clone(),
            Self::Boolean(v) => v.to_string(),
            Self::Date(v) => v.format("%Y-%m-%d").to_string(),
            Self::Timestamp(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// A named, typed column of a tabular result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// In-memory tabular data: ordered named columns plus ordered rows.
///
/// Invariants: every row has exactly one value per declared column, and the
/// column order never changes for the lifetime of the result. Rows can only
/// be added through [`TabularResult::push_row`], which enforces arity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularResult {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// Creates an empty result with the given column layout.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, enforcing the one-value-per-column invariant.
    ///
    /// # Errors
    /// Returns a configuration error if the row arity does not match the
    /// declared columns.
    pub fn push_row(&mut self, row: Vec<Value>) -> crate::Result<()> {
        if row.len() != self.columns.len() {
            return Err(crate::error::OraflowError::configuration(format!(
                "row has {} values but the result declares {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Declared columns, in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rows, in insertion order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finds a column by case-insensitive name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// First non-null value in the named column, if any.
    pub fn first_value(&self, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.iter().map(|r| &r[idx]).find(|v| !v.is_null())
    }

    /// Distinct non-null rendered values of the named column, sorted.
    /// Used to split outputs by a grouping column.
    pub fn distinct_values(&self, name: &str) -> Vec<String> {
        let Some(idx) = self.column_index(name) else {
            return Vec::new();
        };
        let mut seen: Vec<String> = Vec::new();
        for row in &self.rows {
            if row[idx].is_null() {
                continue;
            }
            let rendered = row[idx].render();
            if !seen.contains(&rendered) {
                seen.push(rendered);
            }
        }
        seen.sort();
        seen
    }

    /// A new result with the same columns, keeping only rows whose named
    /// column renders to `value`.
    pub fn filter_by(&self, name: &str, value: &str) -> Self {
        let rows = match self.column_index(name) {
            Some(idx) => self
                .rows
                .iter()
                .filter(|r| r[idx].render() == value)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Renames columns in place per the given (from, to) pairs.
    /// Matching is case-insensitive on the source name.
    pub fn rename_columns(&mut self, renames: &[(String, String)]) {
        for column in &mut self.columns {
            if let Some((_, to)) = renames
                .iter()
                .find(|(from, _)| from.eq_ignore_ascii_case(&column.name))
            {
                column.name = to.clone();
            }
        }
    }
}

/// One column of a target table, as reported by the database dictionary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetColumn {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub has_default: bool,
}

/// Schema of an upload target table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<TargetColumn>,
}

impl TableSchema {
    /// Finds a target column by case-insensitive name.
    pub fn column(&self, name: &str) -> Option<&TargetColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
