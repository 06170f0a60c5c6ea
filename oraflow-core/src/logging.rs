//! Shared logging setup for the oraflow binary.
//!
//! Log output must never contain credentials; everything routed through
//! here is expected to have gone through the sanitizers in [`crate::error`].

use crate::Result;

/// Initializes structured logging.
///
/// # Arguments
/// * `debug` - If true, log at DEBUG; otherwise INFO
/// * `quiet` - If true, only show ERROR level logs (wins over `debug`)
pub fn init_logging(debug: bool, quiet: bool) -> Result<()> {
    let level = match (quiet, debug) {
        (true, _) => tracing::Level::ERROR,
        (false, false) => tracing::Level::INFO,
        (false, true) => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::OraflowError::configuration(format!(
                "Failed to initialize logging: {e}"
            ))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    // Logging can only be initialized once per test process, so only the
    // level selection logic is exercised here.

    #[test]
    fn test_level_selection() {
        let cases = [
            ((true, false), tracing::Level::ERROR),
            ((true, true), tracing::Level::ERROR),
            ((false, false), tracing::Level::INFO),
            ((false, true), tracing::Level::DEBUG),
        ];
        for ((quiet, debug), expected) in cases {
            let level = match (quiet, debug) {
                (true, _) => tracing::Level::ERROR,
                (false, false) => tracing::Level::INFO,
                (false, true) => tracing::Level::DEBUG,
            };
            assert_eq!(level, expected, "quiet={quiet}, debug={debug}");
        }
    }
}
