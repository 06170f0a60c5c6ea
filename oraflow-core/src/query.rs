//! Parameterized query execution.
//!
//! Thin layer over [`DatabaseClient::query`] that checks the bind names up
//! front: a parameter whose placeholder does not appear in the statement is
//! a programming error and is rejected before anything reaches the server.
//! Values are always bound, never spliced into the SQL text.

use tracing::{debug, info};

use crate::db::DatabaseClient;
use crate::error::{OraflowError, QueryErrorKind};
use crate::models::{TabularResult, Value};
use crate::Result;

/// Runs one query and materializes the full result set in memory.
///
/// Result sets here are bounded forecast extracts, small enough that
/// streaming would buy nothing over a plain `Vec` of rows.
///
/// # Errors
/// `Query` with `Syntax` when a parameter has no matching placeholder, or
/// whatever classified error the driver reports.
pub fn run(
    client: &mut dyn DatabaseClient,
    sql: &str,
    params: &[(String, Value)],
) -> Result<TabularResult> {
    let placeholders = bind_names(sql);
    for (name, _) in params {
        if !placeholders.iter().any(|p| p.eq_ignore_ascii_case(name)) {
            return Err(OraflowError::query(
                QueryErrorKind::Syntax,
                format!("parameter ':{name}' has no placeholder in the statement"),
            ));
        }
    }

    debug!("Executing query with {} bound parameters", params.len());
    let result = client.query(sql, params)?;
    info!(
        "Query returned {} rows across {} columns",
        result.row_count(),
        result.columns().len()
    );
    Ok(result)
}

/// Extracts `:name` placeholders from a statement.
///
/// Skips single-quoted literals so text like `'12:30'` is not mistaken for
/// a bind. Placeholder names follow the identifier grammar; `:=` and
/// positional `:1` style binds are not produced by our templates.
fn bind_names(sql: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;
    while let Some(c) = chars.next() {
        match c {
            '\'' => in_literal = !in_literal,
            ':' if !in_literal => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !name.is_empty() && name.chars().next().is_some_and(char::is_alphabetic) {
                    names.push(name);
                }
            }
            _ => {}
        }
    }
    names
}
