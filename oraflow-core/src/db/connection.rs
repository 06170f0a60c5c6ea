//! Connection lifecycle: driver probing, open with retry, guaranteed close.
//!
//! Recovery policy depends on the failure class: authentication errors get
//! one credential re-prompt, network errors get a bounded exponential
//! backoff retry, a missing driver aborts before any network activity.

use tracing::{info, warn};

use super::driver;
use super::{ConnectionConfig, DatabaseClient, RetryPolicy};
use crate::credentials::{CredentialPrompt, CredentialStore, Credentials};
use crate::error::{ConnectionErrorKind, OraflowError};
use crate::Result;

/// Opens and supervises the one database connection a pipeline run owns.
pub struct ConnectionManager {
    config: ConnectionConfig,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Opens a connection with the given credentials.
    ///
    /// Probes the configured driver paths first and fails with
    /// `DriverNotFound` before any network attempt if none exists. Network
    /// failures are retried per the configured policy; authentication
    /// failures are returned immediately for the caller's re-prompt flow.
    ///
    /// # Errors
    /// `Connection` with the appropriate [`ConnectionErrorKind`].
    pub fn connect(&self, credentials: &Credentials) -> Result<Box<dyn DatabaseClient>> {
        let driver_dir = driver::locate_driver(&self.config.driver_paths)?;
        driver::export_driver_path(&driver_dir);
        self.open_with_retry(credentials)
    }

    /// Resolves credentials and connects, re-prompting once when the
    /// database rejects them.
    ///
    /// # Errors
    /// Propagates credential, driver, and connection errors after the
    /// recovery budget is spent.
    pub fn establish(
        &self,
        store: &CredentialStore,
        prompt: &dyn CredentialPrompt,
    ) -> Result<Box<dyn DatabaseClient>> {
        let credentials = store.resolve(prompt, false)?;
        match self.connect(&credentials) {
            Err(OraflowError::Connection {
                kind: ConnectionErrorKind::Authentication,
                context,
            }) => {
                warn!("Database rejected the stored credentials: {context}");
                let fresh = store.resolve(prompt, true)?;
                self.connect(&fresh)
            }
            other => other,
        }
    }

    #[cfg(feature = "oracle")]
    fn open_with_retry(&self, credentials: &Credentials) -> Result<Box<dyn DatabaseClient>> {
        let client = with_retry(&self.config.retry, || {
            super::oracle::OracleClient::connect(credentials, &self.config)
        })?;
        info!("Connected to Oracle instance {}", self.config.descriptor);
        Ok(Box::new(client))
    }

    #[cfg(not(feature = "oracle"))]
    fn open_with_retry(&self, _credentials: &Credentials) -> Result<Box<dyn DatabaseClient>> {
        Err(OraflowError::configuration(
            "built without the 'oracle' feature; no database driver available",
        ))
    }
}

/// Runs `operation`, retrying retryable failures with exponential backoff.
///
/// The budget counts total attempts, so `attempts: 3` means at most two
/// sleeps. Non-retryable errors are returned immediately.
pub(crate) fn with_retry<T>(
    policy: &RetryPolicy,
    mut operation: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut delay = policy.base_delay;
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.attempts => {
                warn!(
                    "Attempt {attempt}/{} failed ({e}); retrying in {:?}",
                    policy.attempts, delay
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
