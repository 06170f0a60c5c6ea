//! Credential resolution, caching, and the interactive prompt capability.
//!
//! Credentials live encrypted at rest (see [`crate::security::encryption`])
//! under key material derived from a machine-scoped fingerprint that is not
//! stored alongside the blob. Plaintext passwords never reach logs and
//! in-memory copies are zeroed on drop.
//!
//! Correctness of the credentials is proven by the connect attempt, not
//! here; this module only validates non-emptiness.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::OraflowError;
use crate::security::{decrypt_blob, encrypt_blob, EncryptedBlob};
use crate::Result;

/// Database credentials.
///
/// # Security
/// - `Debug` redacts the password
/// - memory is zeroed when the value is dropped
/// - serialization exists only for the encrypted store path
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Connect descriptor or alias identifying the target instance
    pub dsn: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .field("dsn", &self.dsn)
            .finish()
    }
}

impl Credentials {
    /// Non-emptiness check; authentication correctness is the connection
    /// manager's concern.
    ///
    /// # Errors
    /// Returns `Credential` error for an empty username or DSN.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(OraflowError::credential("username must not be empty"));
        }
        if self.dsn.trim().is_empty() {
            return Err(OraflowError::credential("connect descriptor must not be empty"));
        }
        Ok(())
    }
}

/// Capability interface for interactive credential acquisition.
///
/// Injected into [`CredentialStore`] so tests can supply a deterministic
/// fake instead of a blocking console interaction.
pub trait CredentialPrompt {
    /// Asks the operator for credentials.
    fn ask(&self) -> Result<Credentials>;
}

/// Console prompt: username on stdin, password without echo.
pub struct ConsolePrompt {
    dsn: String,
}

impl ConsolePrompt {
    /// The DSN comes from configuration; the operator supplies only the
    /// account details.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self { dsn: dsn.into() }
    }
}

impl CredentialPrompt for ConsolePrompt {
    fn ask(&self) -> Result<Credentials> {
        use std::io::Write;

        println!(
            "\nOracle credentials are required. These are the same username and\n\
             password used to access the Oracle database.\n\
             (Run with --reset-credentials to replace stored credentials.)\n"
        );

        print!("Username: ");
        std::io::stdout()
            .flush()
            .map_err(|e| OraflowError::io("flushing stdout before prompt", e))?;
        let mut username = String::new();
        std::io::stdin()
            .read_line(&mut username)
            .map_err(|e| OraflowError::io("reading username", e))?;

        let password = rpassword::prompt_password("Password: ")
            .map_err(|e| OraflowError::io("reading password", e))?;

        Ok(Credentials {
            username: username.trim().to_lowercase(),
            password: password.trim().to_string(),
            dsn: self.dsn.clone(),
        })
    }
}

/// Key material for the store: a machine-scoped fingerprint.
///
/// Not stored next to the blob; a store file copied to another machine or
/// account will fail to decrypt and trigger a re-prompt.
fn machine_fingerprint() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string());
    format!("oraflow:{user}@{host}")
}

/// Resolves, persists, and clears cached database credentials.
pub struct CredentialStore {
    path: PathBuf,
    key_material: String,
}

impl CredentialStore {
    /// Store backed by the given file, keyed to this machine.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key_material: machine_fingerprint(),
        }
    }

    /// Store with explicit key material. Exists for tests that need a
    /// fingerprint independent of the environment.
    pub fn with_key_material(path: impl Into<PathBuf>, key_material: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key_material: key_material.into(),
        }
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns cached credentials, prompting when forced, missing, or the
    /// cache cannot be decrypted. Never crashes on a corrupt store.
    ///
    /// # Errors
    /// Fails only if prompting fails or the prompted credentials are
    /// structurally invalid.
    pub fn resolve(&self, prompt: &dyn CredentialPrompt, force_reset: bool) -> Result<Credentials> {
        if force_reset || !self.path.exists() {
            return self.prompt_and_persist(prompt);
        }
        match self.load_cached() {
            Ok(credentials) => {
                debug!("Using cached credentials from {}", self.path.display());
                Ok(credentials)
            }
            Err(e) => {
                warn!("Credential store unusable ({e}); prompting for credentials");
                self.prompt_and_persist(prompt)
            }
        }
    }

    /// Encrypts and writes credentials to the store file.
    ///
    /// # Errors
    /// Fails on serialization or file write errors. The plaintext is never
    /// logged on any path.
    pub fn persist(&self, credentials: &Credentials) -> Result<()> {
        let plaintext = Zeroizing::new(serde_json::to_vec(credentials).map_err(|e| {
            OraflowError::Serialization {
                context: "encoding credentials for the store".to_string(),
                source: e,
            }
        })?);
        let blob = encrypt_blob(&plaintext, &self.key_material)?;
        let encoded = serde_json::to_vec_pretty(&blob).map_err(|e| OraflowError::Serialization {
            context: "encoding encrypted credential blob".to_string(),
            source: e,
        })?;
        std::fs::write(&self.path, encoded)
            .map_err(|e| OraflowError::io(format!("writing {}", self.path.display()), e))?;
        debug!("Persisted encrypted credentials to {}", self.path.display());
        Ok(())
    }

    /// Deletes the persisted store. Idempotent.
    ///
    /// # Errors
    /// Fails only on filesystem errors other than "not found".
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed credential store {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OraflowError::io(
                format!("removing {}", self.path.display()),
                e,
            )),
        }
    }

    fn prompt_and_persist(&self, prompt: &dyn CredentialPrompt) -> Result<Credentials> {
        let credentials = prompt.ask()?;
        credentials.validate()?;
        if let Err(e) = self.persist(&credentials) {
            // A read-only working directory must not block the run
            warn!("Could not persist credentials: {e}");
        }
        Ok(credentials)
    }

    fn load_cached(&self) -> Result<Credentials> {
        let raw = std::fs::read(&self.path)
            .map_err(|e| OraflowError::io(format!("reading {}", self.path.display()), e))?;
        let blob: EncryptedBlob =
            serde_json::from_slice(&raw).map_err(|e| OraflowError::Serialization {
                context: "decoding encrypted credential blob".to_string(),
                source: e,
            })?;
        let plaintext = Zeroizing::new(decrypt_blob(&blob, &self.key_material)?);
        let credentials: Credentials =
            serde_json::from_slice(&plaintext).map_err(|e| OraflowError::Serialization {
                context: "decoding credentials from the store".to_string(),
                source: e,
            })?;
        credentials.validate()?;
        Ok(credentials)
    }
}
