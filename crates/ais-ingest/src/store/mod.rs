//! Durable store contracts
//!
//! The pipeline depends on two narrow traits rather than on a database:
//!
//! - [`ProcessedLedger`]: which files are done, and which vessels need
//!   enrichment. This is the only state that survives between runs.
//! - [`PositionStore`]: append-only sink for position rows.
//!
//! [`postgres::PgStore`] implements both over an `sqlx` pool. Implementations
//! must be safe to call from several workers at once.

pub mod postgres;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::StoreError;
use crate::models::{PositionRecord, VesselId};

pub use postgres::PgStore;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable record of processed files and the vessel todo set
#[async_trait]
pub trait ProcessedLedger: Send + Sync {
    /// Every path ever marked processed
    async fn list_processed_files(&self) -> StoreResult<HashSet<String>>;

    /// Record that all rows of `path` are durably stored
    async fn mark_file_processed(&self, path: &str) -> StoreResult<()>;

    /// Find-or-insert a todo entry; repeating it for the same vessel is a no-op
    async fn upsert_vessel_todo(&self, vessel_id: &VesselId) -> StoreResult<()>;
}

/// Append-only sink for position rows
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn insert_position(&self, record: &PositionRecord) -> StoreResult<()>;
}
