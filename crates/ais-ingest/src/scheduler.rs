//! Bounded-concurrency scheduling of the file backlog
//!
//! A fixed number of workers drain one shared queue. Each file is popped by
//! exactly one worker under the queue lock. Workers return their per-file
//! outcomes and the scheduler folds them into the run's completed-file and
//! touched-vessel sets once all workers are done. Completion order across
//! files is not defined.

use indicatif::ProgressBar;
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{IngestError, Result, StoreError};
use crate::models::VesselId;
use crate::processor::{FileOutcome, FileProcessor, FileStatus};
use crate::store::ProcessedLedger;

type Backlog = Arc<Mutex<VecDeque<PathBuf>>>;

/// Aggregate of one scheduling pass
#[derive(Debug, Default)]
pub struct ScheduleReport {
    pub completed_files: BTreeSet<PathBuf>,
    /// Files skipped this run with the reason they failed
    pub failed_files: Vec<(PathBuf, String)>,
    pub touched_vessels: BTreeSet<VesselId>,
    pub rows_persisted: usize,
    /// Todo entries upserted after the backlog drained
    pub vessels_flushed: usize,
    pub todo_failures: usize,
}

impl ScheduleReport {
    fn fold(&mut self, outcome: FileOutcome) {
        self.rows_persisted += outcome.rows_persisted;
        self.touched_vessels.extend(outcome.vessels);
        match outcome.status {
            FileStatus::Completed => {
                self.completed_files.insert(outcome.path);
            },
            FileStatus::Failed(error) => self.failed_files.push((outcome.path, error.to_string())),
        }
    }
}

pub struct IngestionScheduler {
    processor: FileProcessor,
    ledger: Arc<dyn ProcessedLedger>,
    workers: usize,
    progress: ProgressBar,
}

impl IngestionScheduler {
    pub fn new(processor: FileProcessor, ledger: Arc<dyn ProcessedLedger>, workers: usize) -> Self {
        Self {
            processor,
            ledger,
            workers: workers.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    /// Tick `progress` once per file outcome
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Process every file, then flush the touched vessels to the ledger
    ///
    /// Returns once every file has an outcome. Fails only on errors that
    /// are not tied to a single file, such as losing the store connection;
    /// remaining workers are then aborted.
    pub async fn run(&self, files: Vec<PathBuf>) -> Result<ScheduleReport> {
        let total = files.len();
        let worker_count = self.workers.min(total);
        let backlog: Backlog = Arc::new(Mutex::new(files.into()));

        info!(files = total, workers = worker_count, "Scheduling backlog");

        let mut set = JoinSet::new();
        for worker_id in 0..worker_count {
            set.spawn(drain(
                worker_id,
                backlog.clone(),
                self.processor.clone(),
                self.progress.clone(),
            ));
        }

        let mut report = ScheduleReport::default();
        while let Some(joined) = set.join_next().await {
            let outcomes = match joined {
                Ok(Ok(outcomes)) => outcomes,
                Ok(Err(e)) => {
                    set.abort_all();
                    return Err(e);
                },
                Err(e) => {
                    set.abort_all();
                    return Err(IngestError::Worker(e.to_string()));
                },
            };
            for outcome in outcomes {
                report.fold(outcome);
            }
        }
        self.progress.finish_and_clear();

        info!(
            completed = report.completed_files.len(),
            failed = report.failed_files.len(),
            rows = report.rows_persisted,
            "Backlog drained"
        );

        self.flush_vessels(&mut report).await?;
        Ok(report)
    }

    async fn flush_vessels(&self, report: &mut ScheduleReport) -> Result<()> {
        for vessel in &report.touched_vessels {
            match self.ledger.upsert_vessel_todo(vessel).await {
                Ok(()) => report.vessels_flushed += 1,
                Err(StoreError::Connection(msg)) => return Err(IngestError::Connection(msg)),
                Err(StoreError::Query(msg)) => {
                    warn!(vessel = %vessel, error = %msg, "Failed to upsert vessel todo entry");
                    report.todo_failures += 1;
                },
            }
        }

        info!(
            vessels = report.vessels_flushed,
            failures = report.todo_failures,
            "Flushed vessel todo entries"
        );
        Ok(())
    }
}

async fn drain(
    worker_id: usize,
    backlog: Backlog,
    processor: FileProcessor,
    progress: ProgressBar,
) -> Result<Vec<FileOutcome>> {
    let mut outcomes = Vec::new();

    loop {
        // Guard dropped before processing so other workers can dequeue
        let next = backlog.lock().await.pop_front();
        let Some(path) = next else {
            break;
        };

        tracing::debug!(worker_id, path = %path.display(), "Picked file");
        let outcome = processor.process(&path).await?;
        progress.inc(1);
        outcomes.push(outcome);
    }

    Ok(outcomes)
}
