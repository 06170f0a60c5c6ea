//! Core library for oraflow, the Oracle forecast transfer tool.
//!
//! This crate provides everything the `oraflow` binary builds on: the
//! encrypted credential store, connection lifecycle with driver probing and
//! retry, parameterized query execution, schema validation, batched bulk
//! loading, local file formats, and the two end-to-end pipelines.
//!
//! # Security Guarantees
//! - Credentials are held in zeroize-on-drop buffers and never logged
//! - The on-disk credential store is AES-GCM encrypted, keyed per machine
//! - Connect strings are redacted before they appear in any error message
//! - SQL values are always bound as parameters, never interpolated
//!
//! # Architecture
//! - [`db::DatabaseClient`] is the seam between pipelines and the Oracle
//!   driver; everything above it is testable with an in-memory fake
//! - Configuration is loaded once and passed by reference; no globals
//! - Partial failure is first-class: bulk loads report per-batch outcomes
//!   instead of aborting on the first bad batch

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod io;
pub mod loader;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod security;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use credentials::{CredentialPrompt, CredentialStore, Credentials};
pub use db::connection::ConnectionManager;
pub use db::{ConnectionConfig, DatabaseClient, RetryPolicy};
pub use error::{ConnectionErrorKind, OraflowError, QueryErrorKind, Result};
pub use loader::{BulkLoader, LoadSummary};
pub use models::{Column, DataType, TableSchema, TabularResult, TargetColumn, Value};
pub use pipeline::download::{DownloadOptions, DownloadOutcome};
pub use pipeline::upload::UploadOutcome;
pub use validation::{ColumnOutcome, ValidationReport};
