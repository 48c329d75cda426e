//! Error types for AIS position ingestion
//!
//! Run-level errors (`Discovery`, `Connection`, `Config`) abort the run.
//! File-level errors (`Parse`, `Persist`) are carried inside a
//! [`FileOutcome`](crate::processor::FileOutcome) and never abort siblings.
//! `Archive` errors are reported after ingestion has already been recorded.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Input directory could not be listed
    #[error("Failed to list input directory '{}': {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file is unreadable, malformed, or badly named
    #[error("Parse error in '{}': {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A row or marker write failed for this file
    #[error("Persist error in '{}': {reason}", path.display())]
    Persist { path: PathBuf, reason: String },

    /// The durable store is unreachable
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Compression or deletion of archived files failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// A ledger query failed outside of per-file processing
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    /// A worker task panicked or was cancelled
    #[error("Worker failure: {0}")]
    Worker(String),
}

impl IngestError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn persist(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Persist {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error must terminate the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            IngestError::Parse { .. } | IngestError::Persist { .. } | IngestError::Archive(_)
        )
    }
}

/// Failure reported by a store implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store is unreachable; the run cannot continue
    #[error("connection lost: {0}")]
    Connection(String),

    /// A single statement failed; the store is still usable
    #[error("query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
            sqlx::Error::Database(ref db_err)
                if db_err.code().is_some_and(|code| is_connection_sqlstate(&code)) =>
            {
                StoreError::Connection(err.to_string())
            },
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// SQLSTATEs meaning the server dropped or refused the session:
/// class `08` (connection exception) and `57P01`..`57P03` (shutdown, cannot connect now)
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(msg) => IngestError::Connection(msg),
            StoreError::Query(msg) => IngestError::Store(msg),
        }
    }
}
