//! Single-file processing
//!
//! `parse -> persist rows -> mark processed`. A file is marked only after
//! every one of its rows was written, so the ledger never names a file
//! whose rows are missing. A crash between the last row and the marker
//! leaves the file unmarked and it is reprocessed next run (rows may then be
//! duplicated).

use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result, StoreError};
use crate::models::VesselId;
use crate::parser::InputFile;
use crate::store::{PositionStore, ProcessedLedger};

/// How one file ended
#[derive(Debug)]
pub enum FileStatus {
    /// All rows and the marker were written
    Completed,
    /// Skipped this run; the file stays eligible for the next one
    Failed(IngestError),
}

/// Per-file result folded by the scheduler
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    pub rows_total: usize,
    pub rows_persisted: usize,
    /// Vessels seen in the file, whether or not their rows were written
    pub vessels: HashSet<VesselId>,
}

impl FileOutcome {
    fn failed(path: &Path, error: IngestError) -> Self {
        Self {
            path: path.to_path_buf(),
            status: FileStatus::Failed(error),
            rows_total: 0,
            rows_persisted: 0,
            vessels: HashSet::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, FileStatus::Completed)
    }
}

/// Parses a file and writes its rows and marker
#[derive(Clone)]
pub struct FileProcessor {
    positions: Arc<dyn PositionStore>,
    ledger: Arc<dyn ProcessedLedger>,
}

impl FileProcessor {
    pub fn new(positions: Arc<dyn PositionStore>, ledger: Arc<dyn ProcessedLedger>) -> Self {
        Self { positions, ledger }
    }

    /// Process one file
    ///
    /// Parse and write failures come back as a `Failed` outcome. `Err` is
    /// reserved for losing the store connection, which ends the run.
    pub async fn process(&self, path: &Path) -> Result<FileOutcome> {
        let records = match InputFile::load(path).await.and_then(|file| file.records()) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse file");
                return Ok(FileOutcome::failed(path, e));
            },
        };

        let rows_total = records.len();
        let vessels: HashSet<VesselId> = records.iter().map(|r| r.vessel_id.clone()).collect();

        // All rows of the file go out together; order between them is unspecified
        let results = join_all(records.iter().map(|r| self.positions.insert_position(r))).await;

        let mut rows_persisted = 0;
        let mut first_failure: Option<String> = None;
        for result in results {
            match result {
                Ok(()) => rows_persisted += 1,
                Err(StoreError::Connection(msg)) => return Err(IngestError::Connection(msg)),
                Err(StoreError::Query(msg)) => {
                    first_failure.get_or_insert(msg);
                },
            }
        }

        if let Some(reason) = first_failure {
            let error = IngestError::persist(
                path,
                format!(
                    "{} of {} rows failed to persist (first error: {})",
                    rows_total - rows_persisted,
                    rows_total,
                    reason
                ),
            );
            warn!(path = %path.display(), error = %error, "File not marked processed");
            return Ok(FileOutcome {
                path: path.to_path_buf(),
                status: FileStatus::Failed(error),
                rows_total,
                rows_persisted,
                vessels,
            });
        }

        let status = match self.ledger.mark_file_processed(&path.to_string_lossy()).await {
            Ok(()) => {
                info!(path = %path.display(), rows = rows_total, vessels = vessels.len(), "File ingested");
                FileStatus::Completed
            },
            Err(StoreError::Connection(msg)) => return Err(IngestError::Connection(msg)),
            Err(StoreError::Query(msg)) => {
                let error = IngestError::persist(path, format!("failed to write marker: {msg}"));
                warn!(path = %path.display(), error = %error, "File not marked processed");
                FileStatus::Failed(error)
            },
        };

        debug!(path = %path.display(), rows_persisted, "Finished file");

        Ok(FileOutcome {
            path: path.to_path_buf(),
            status,
            rows_total,
            rows_persisted,
            vessels,
        })
    }
}
