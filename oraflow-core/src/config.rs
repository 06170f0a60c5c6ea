//! Application configuration, loaded from YAML.
//!
//! The configuration object is constructed once in `main` and passed by
//! reference into every component; there is no ambient global state. When no
//! config file exists, built-in defaults matching the standard forecast
//! deployment are used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::{ConnectionConfig, RetryPolicy};
use crate::error::OraflowError;
use crate::Result;

/// Default forecast extraction query, used when the config file carries none.
const DEFAULT_FORECAST_QUERY: &str = "\
SELECT *
FROM network_rw.bomfc_dpv_detail_hist
WHERE TRUNC(validity_date) = (SELECT TRUNC(MAX(validity_date)) FROM network_rw.bomfc_dpv_detail_hist)";

/// Well-known Oracle Instant Client install locations, probed in order.
fn default_driver_paths() -> Vec<PathBuf> {
    [
        "/opt/oracle/instantclient_21_13",
        "/opt/oracle/instantclient_19_20",
        "/usr/lib/oracle/21/client64/lib",
        "C:\\oracle\\instantclient_21_13",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

/// One database host entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
    pub service: String,
}

impl HostConfig {
    /// EZConnect descriptor for this host: `//host:port/service`.
    pub fn descriptor(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service)
    }
}

/// Database section: named hosts plus the alias selecting the active one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub alias: String,
    pub hosts: BTreeMap<String, HostConfig>,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let mut hosts = BTreeMap::new();
        hosts.insert(
            "sp1".to_string(),
            HostConfig {
                host: "sp1-db.internal".to_string(),
                port: 1521,
                service: "NETWORKP".to_string(),
            },
        );
        Self {
            alias: "sp1".to_string(),
            hosts,
            connect_timeout_secs: 30,
        }
    }
}

/// Retry budget for transient network failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// Upload pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub default_table: String,
    pub batch_size: usize,
    pub stop_on_first_error: bool,
    /// File-header to database-column renames, applied after reading
    pub column_renames: BTreeMap<String, String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        let mut column_renames = BTreeMap::new();
        column_renames.insert("Validity_Date".to_string(), "validity_date".to_string());
        Self {
            default_table: "t_ibp_cons_rdc".to_string(),
            batch_size: 500,
            stop_on_first_error: false,
            column_renames,
        }
    }
}

/// Download output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix for folder and file names
    pub prefix: String,
    /// Result column whose distinct values split the Excel output
    pub group_column: Option<String>,
    /// Distribution URL surfaced after a successful download
    pub drive_url: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "BOM EO Forecast".to_string(),
            group_column: Some("DP_GROUP_MKT".to_string()),
            drive_url: None,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    /// Ordered Oracle client library search paths; first existing wins
    pub oracle_client_paths: Vec<PathBuf>,
    pub retry: RetryConfig,
    /// Named SQL query templates
    pub queries: BTreeMap<String, String>,
    pub upload: UploadConfig,
    pub output: OutputConfig,
    /// Location of the encrypted credential store
    pub credentials_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut queries = BTreeMap::new();
        queries.insert("forecast".to_string(), DEFAULT_FORECAST_QUERY.to_string());
        Self {
            database: DatabaseConfig::default(),
            oracle_client_paths: default_driver_paths(),
            retry: RetryConfig::default(),
            queries,
            upload: UploadConfig::default(),
            output: OutputConfig::default(),
            credentials_file: PathBuf::from("credentials.enc"),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the given file, or from `oraflow.yaml` in
    /// the working directory, or falls back to built-in defaults.
    ///
    /// # Errors
    /// Returns an error if an explicitly named file is missing or malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => {
                let implicit = Path::new("oraflow.yaml");
                if implicit.exists() {
                    Self::from_file(implicit)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| OraflowError::io(format!("reading config {}", path.display()), e))?;
        serde_yaml::from_str(&raw).map_err(|e| {
            OraflowError::configuration(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Validates configuration values before a run starts.
    ///
    /// # Errors
    /// Returns error if values are out of range or reference missing entries.
    pub fn validate(&self) -> Result<()> {
        if !self.database.hosts.contains_key(&self.database.alias) {
            return Err(OraflowError::configuration(format!(
                "database alias '{}' has no matching host entry",
                self.database.alias
            )));
        }
        if self.database.connect_timeout_secs == 0 {
            return Err(OraflowError::configuration(
                "connect_timeout_secs must be greater than 0",
            ));
        }
        if self.upload.batch_size == 0 {
            return Err(OraflowError::configuration(
                "upload batch_size must be greater than 0",
            ));
        }
        if self.retry.attempts == 0 {
            return Err(OraflowError::configuration(
                "retry attempts must be at least 1",
            ));
        }
        Ok(())
    }

    /// The active host entry selected by `database.alias`.
    pub fn active_host(&self) -> Result<&HostConfig> {
        self.database.hosts.get(&self.database.alias).ok_or_else(|| {
            OraflowError::configuration(format!(
                "database alias '{}' has no matching host entry",
                self.database.alias
            ))
        })
    }

    /// Builds the immutable per-run connection configuration.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let host = self.active_host()?;
        Ok(ConnectionConfig {
            descriptor: host.descriptor(),
            driver_paths: self.oracle_client_paths.clone(),
            connect_timeout: Duration::from_secs(self.database.connect_timeout_secs),
            retry: RetryPolicy {
                attempts: self.retry.attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
            },
        })
    }

    /// Named query template lookup.
    pub fn query(&self, name: &str) -> Result<&str> {
        self.queries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| OraflowError::configuration(format!("query '{name}' not configured")))
    }

    /// Column renames as (from, to) pairs for [`crate::models::TabularResult::rename_columns`].
    pub fn rename_pairs(&self) -> Vec<(String, String)> {
        self.upload
            .column_renames
            .iter()
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.query("forecast").is_ok());
        assert!(config.query("nonexistent").is_err());
    }

    #[test]
    fn test_descriptor_shape() {
        let config = AppConfig::default();
        let descriptor = config.active_host().unwrap().descriptor();
        assert!(descriptor.starts_with("//"));
        assert!(descriptor.contains(":1521/"));
    }

    #[test]
    fn test_alias_must_resolve() {
        let mut config = AppConfig::default();
        config.database.alias = "sp9".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = AppConfig::default();
        config.upload.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_yaml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "upload:\n  batch_size: 50\n  default_table: t_custom\noutput:\n  prefix: Regional Forecast"
        )
        .unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.upload.batch_size, 50);
        assert_eq!(config.upload.default_table, "t_custom");
        assert_eq!(config.output.prefix, "Regional Forecast");
        // Untouched sections keep their defaults
        assert_eq!(config.retry.attempts, 3);
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/oraflow.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_rename_pairs() {
        let config = AppConfig::default();
        let pairs = config.rename_pairs();
        assert!(pairs
            .iter()
            .any(|(from, to)| from == "Validity_Date" && to == "validity_date"));
    }
}
