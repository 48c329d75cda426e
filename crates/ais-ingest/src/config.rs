//! Ingestion configuration
//!
//! Resolved once at startup from the environment (and an optional `.env`
//! file). The pipeline only ever sees the already-resolved values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{IngestError, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default source directory for position report files.
pub const DEFAULT_INPUT_DIR: &str = "./data/";

/// Default directory receiving archive bundles.
pub const DEFAULT_ARCHIVE_DIR: &str = "./archive/";

/// Default number of concurrent file workers.
pub const DEFAULT_WORKERS: usize = 3;

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub database: DatabaseConfig,
    /// Directory scanned for `*.json` position files
    pub input_dir: PathBuf,
    /// Directory where archive bundles are written
    pub archive_dir: PathBuf,
    /// Number of concurrent file workers
    pub workers: usize,
    /// Upper bound on files scheduled per run; `None` drains the whole backlog
    pub batch_limit: Option<usize>,
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// Variables: `DATABASE_URL` (required), `DB_MAX_CONNECTIONS`,
    /// `DB_MIN_CONNECTIONS`, `DB_CONNECT_TIMEOUT`, `AIS_INPUT_DIR`,
    /// `AIS_ARCHIVE_DIR`, `INGEST_WORKERS`, `INGEST_BATCH_LIMIT`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = std::env::var("DATABASE_URL")
            .map_err(|_| IngestError::config("DATABASE_URL not set"))?;

        let config = Self {
            database: DatabaseConfig {
                url,
                max_connections: env_parse("DB_MAX_CONNECTIONS")?
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_parse("DB_MIN_CONNECTIONS")?
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT")?
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            input_dir: std::env::var("AIS_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_INPUT_DIR)),
            archive_dir: std::env::var("AIS_ARCHIVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARCHIVE_DIR)),
            workers: env_parse("INGEST_WORKERS")?.unwrap_or(DEFAULT_WORKERS),
            batch_limit: env_parse("INGEST_BATCH_LIMIT")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Override the input directory (the `--input` flag)
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(IngestError::config("DATABASE_URL cannot be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(IngestError::config("DB_MAX_CONNECTIONS must be greater than 0"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(IngestError::config(format!(
                "DB_MIN_CONNECTIONS ({}) cannot be greater than DB_MAX_CONNECTIONS ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }
        if self.workers == 0 {
            return Err(IngestError::config("INGEST_WORKERS must be greater than 0"));
        }
        if self.batch_limit == Some(0) {
            return Err(IngestError::config("INGEST_BATCH_LIMIT must be greater than 0 when set"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| IngestError::config(format!("{key} has invalid value '{raw}'"))),
        Err(_) => Ok(None),
    }
}
