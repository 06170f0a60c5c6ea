//! Oracle client library location.
//!
//! The Instant Client install location varies across machines, so the
//! configuration carries an ordered list of candidate directories and the
//! first one that exists wins. Probing happens before any network activity:
//! a machine without a client library fails fast with `DriverNotFound`.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::OraflowError;
use crate::Result;

#[cfg(windows)]
const LOADER_PATH_VAR: &str = "PATH";
#[cfg(not(windows))]
const LOADER_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Returns the first configured directory that exists.
///
/// # Errors
/// `DriverNotFound` when none of the candidates exist. The error lists the
/// probed paths so the operator can fix the install or the configuration.
pub fn locate_driver(paths: &[PathBuf]) -> Result<PathBuf> {
    for candidate in paths {
        if candidate.is_dir() {
            info!("Using Oracle client libraries from {}", candidate.display());
            return Ok(candidate.clone());
        }
        debug!("No Oracle client at {}", candidate.display());
    }
    let probed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    Err(OraflowError::driver_not_found(format!(
        "no Oracle Instant Client found; probed: [{}]. \
         Install the Instant Client or adjust oracle_client_paths",
        probed.join(", ")
    )))
}

/// Prepends the located directory to the dynamic loader search path.
///
/// This is effective on Windows, where `PATH` is consulted when the driver
/// first loads `oci.dll`. On Linux glibc captures `LD_LIBRARY_PATH` at
/// process start, so this export cannot redirect the current process; the
/// Instant Client must be visible through ldconfig or the variable set
/// before launch. [`locate_driver`] still verifies a client directory
/// exists either way, so a machine without one fails before any network
/// activity.
#[allow(unsafe_code)] // std::env::set_var; runs before any worker thread exists
pub fn export_driver_path(dir: &Path) {
    let separator = if cfg!(windows) { ';' } else { ':' };
    let current = std::env::var(LOADER_PATH_VAR).unwrap_or_default();
    let joined = if current.is_empty() {
        dir.display().to_string()
    } else {
        format!("{}{separator}{current}", dir.display())
    };
    // SAFETY: the tool is single-threaded at connect time; no other thread
    // can be reading the environment concurrently.
    unsafe { std::env::set_var(LOADER_PATH_VAR, joined) };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::{ConnectionErrorKind, OraflowError};

    #[test]
    fn test_first_existing_path_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let paths = vec![
            PathBuf::from("/nonexistent/instantclient"),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ];
        let located = locate_driver(&paths).unwrap();
        assert_eq!(located, first.path());
    }

    #[test]
    fn test_no_existing_path_is_driver_not_found() {
        let paths = vec![
            PathBuf::from("/nonexistent/a"),
            PathBuf::from("/nonexistent/b"),
        ];
        let err = locate_driver(&paths).unwrap_err();
        match err {
            OraflowError::Connection { kind, context } => {
                assert_eq!(kind, ConnectionErrorKind::DriverNotFound);
                assert!(context.contains("/nonexistent/a"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_path_list_is_driver_not_found() {
        assert!(locate_driver(&[]).is_err());
    }
}
