//! Pre-load schema validation.
//!
//! Compares the columns of a parsed file against the target table's
//! dictionary schema and produces a per-column report. A blocking report
//! means the upload pipeline must reject the file before a single row is
//! sent; non-blocking findings are surfaced as warnings and the load
//! proceeds with the matched columns.

use std::fmt;

use tracing::warn;

use crate::models::{Column, DataType, TableSchema};

/// Verdict for one source or target column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOutcome {
    /// Present on both sides with a compatible type
    Matched,
    /// Present on both sides but the source type cannot be stored
    TypeMismatch {
        source: DataType,
        target: DataType,
    },
    /// In the file but not in the table; the column would be dropped
    MissingInTarget,
    /// In the table but not in the file. Blocking when the column is
    /// NOT NULL without a default, since every insert would fail.
    MissingInSource { blocking: bool },
}

/// Full comparison of a file's columns against one target table.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub table: String,
    pub outcomes: Vec<(String, ColumnOutcome)>,
}

impl ValidationReport {
    /// True when the load must not start.
    pub fn is_blocking(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| {
            matches!(
                outcome,
                ColumnOutcome::TypeMismatch { .. }
                    | ColumnOutcome::MissingInTarget
                    | ColumnOutcome::MissingInSource { blocking: true }
            )
        })
    }

    /// Names of the columns that will actually be loaded.
    pub fn matched_columns(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ColumnOutcome::Matched))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation against {}:", self.table)?;
        for (name, outcome) in &self.outcomes {
            match outcome {
                ColumnOutcome::Matched => writeln!(f, "  {name}: ok")?,
                ColumnOutcome::TypeMismatch { source, target } => writeln!(
                    f,
                    "  {name}: type mismatch (file has {source}, table expects {target})"
                )?,
                ColumnOutcome::MissingInTarget => {
                    writeln!(f, "  {name}: not a column of the target table")?;
                }
                ColumnOutcome::MissingInSource { blocking: true } => writeln!(
                    f,
                    "  {name}: required by the table (NOT NULL, no default) but absent from the file"
                )?,
                ColumnOutcome::MissingInSource { blocking: false } => {
                    writeln!(f, "  {name}: absent from the file, table will use NULL/default")?;
                }
            }
        }
        Ok(())
    }
}

/// Validates file columns against the target table schema.
///
/// Matching is case-insensitive since Oracle folds unquoted identifiers to
/// upper case while file headers are usually mixed case.
pub fn validate(columns: &[Column], schema: &TableSchema) -> ValidationReport {
    let mut outcomes = Vec::new();

    for column in columns {
        let outcome = match schema.column(&column.name) {
            Some(target) => {
                if is_storable(&column.data_type, &target.data_type) {
                    ColumnOutcome::Matched
                } else {
                    ColumnOutcome::TypeMismatch {
                        source: column.data_type.clone(),
                        target: target.data_type.clone(),
                    }
                }
            }
            None => ColumnOutcome::MissingInTarget,
        };
        outcomes.push((column.name.clone(), outcome));
    }

    for target in &schema.columns {
        let present = columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&target.name));
        if !present {
            let blocking = !target.nullable && !target.has_default;
            if !blocking {
                warn!(
                    "Column {} is absent from the file; the table default applies",
                    target.name
                );
            }
            outcomes.push((target.name.clone(), ColumnOutcome::MissingInSource { blocking }));
        }
    }

    ValidationReport {
        table: schema.table.clone(),
        outcomes,
    }
}

/// Whether a value of `source` type can be stored into a `target` column
/// without loss that matters.
///
/// Widening is fine (integer into float, date into timestamp, anything into
/// text); narrowing is not (text into a numeric or temporal column).
fn is_storable(source: &DataType, target: &DataType) -> bool {
    match (source, target) {
        // Text lengths differ between inference and dictionary; ignore them
        (DataType::Text { .. }, DataType::Text { .. }) => true,
        (DataType::Integer, DataType::Integer | DataType::Float) => true,
        (DataType::Float, DataType::Float) => true,
        (DataType::Boolean, DataType::Boolean | DataType::Integer) => true,
        (DataType::Date, DataType::Date | DataType::Timestamp) => true,
        (DataType::Timestamp, DataType::Timestamp) => true,
        (DataType::Binary, DataType::Binary) => true,
        (_, DataType::Text { .. }) => true,
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetColumn;

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
                TargetColumn {
                    name: "LOAD_TS".to_string(),
                    data_type: DataType::Timestamp,
                    nullable: false,
                    has_default: true,
                },
            ],
        }
    }

    #[test]
    fn test_matching_file_passes() {
        let columns = vec![
            Column::new("validity_date", DataType::Date),
            Column::new("qty", DataType::Integer),
        ];
        let report = validate(&columns, &schema());
        assert!(!report.is_blocking());
        assert_eq!(report.matched_columns(), vec!["validity_date", "qty"]);
    }

    #[test]
    fn test_extra_file_column_blocks() {
        let columns = vec![
            Column::new("validity_date", DataType::Date),
            Column::new("qty", DataType::Integer),
            Column::new("comment", DataType::text()),
        ];
        let report = validate(&columns, &schema());
        assert!(report.is_blocking());
        assert!(report
            .outcomes
            .iter()
            .any(|(name, o)| name == "comment" && *o == ColumnOutcome::MissingInTarget));
    }

    #[test]
    fn test_missing_required_column_blocks() {
        let columns = vec![Column::new("qty", DataType::Float)];
        let report = validate(&columns, &schema());
        assert!(report.is_blocking());
        assert!(report.outcomes.iter().any(|(name, o)| name
            == "VALIDITY_DATE"
            && *o == ColumnOutcome::MissingInSource { blocking: true }));
    }

    #[test]
    fn test_missing_defaulted_column_is_warning_only() {
        let columns = vec![
            Column::new("validity_date", DataType::Timestamp),
            Column::new("qty", DataType::Float),
        ];
        let report = validate(&columns, &schema());
        // LOAD_TS is NOT NULL but has a default, so its absence is fine
        assert!(!report.is_blocking());
    }

    #[test]
    fn test_text_into_numeric_blocks() {
        let columns = vec![
            Column::new("validity_date", DataType::Timestamp),
            Column::new("qty", DataType::text()),
        ];
        let report = validate(&columns, &schema());
        assert!(report.is_blocking());
        assert!(matches!(
            report.outcomes.iter().find(|(n, _)| n == "qty"),
            Some((_, ColumnOutcome::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn test_report_display_names_every_finding() {
        let columns = vec![Column::new("stray", DataType::text())];
        let report = validate(&columns, &schema());
        let rendered = report.to_string();
        assert!(rendered.contains("stray"));
        assert!(rendered.contains("VALIDITY_DATE"));
    }
}
