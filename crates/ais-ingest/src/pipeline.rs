//! End-to-end ingestion run
//!
//! 1. Load the processed-file ledger
//! 2. Discover input files and keep only the new ones
//! 3. Process the backlog with a fixed worker pool
//! 4. Flush touched vessels to the todo list
//! 5. Optionally archive and delete every file the ledger now accounts for

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::archive::{bundle_path, ArchiveReport, Archiver};
use crate::config::{IngestConfig, DEFAULT_WORKERS};
use crate::discovery::{diff, discover};
use crate::error::Result;
use crate::processor::FileProcessor;
use crate::progress::file_progress;
use crate::scheduler::{IngestionScheduler, ScheduleReport};
use crate::store::{PositionStore, ProcessedLedger};

/// Per-run inputs
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub archive_dir: PathBuf,
    /// Bundle and delete accounted-for files after ingestion
    pub archive: bool,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn from_config(config: &IngestConfig, archive: bool) -> Self {
        Self {
            input_dir: config.input_dir.clone(),
            archive_dir: config.archive_dir.clone(),
            archive,
            show_progress: true,
        }
    }
}

/// Summary of one run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub candidates: usize,
    pub previously_processed: usize,
    pub scheduled: usize,
    /// New files left for a later run by the batch limit
    pub deferred: usize,
    pub schedule: ScheduleReport,
    pub archive: Option<ArchiveReport>,
    pub archive_error: Option<String>,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.schedule.completed_files.len()
    }

    pub fn failed(&self) -> usize {
        self.schedule.failed_files.len()
    }
}

pub struct IngestPipeline {
    ledger: Arc<dyn ProcessedLedger>,
    positions: Arc<dyn PositionStore>,
    archiver: Archiver,
    workers: usize,
    batch_limit: Option<usize>,
}

impl IngestPipeline {
    pub fn new(ledger: Arc<dyn ProcessedLedger>, positions: Arc<dyn PositionStore>) -> Self {
        Self {
            ledger,
            positions,
            archiver: Archiver::default(),
            workers: DEFAULT_WORKERS,
            batch_limit: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Cap the number of new files taken per run
    pub fn with_batch_limit(mut self, limit: Option<usize>) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_archiver(mut self, archiver: Archiver) -> Self {
        self.archiver = archiver;
        self
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id, options)
            .instrument(info_span!("ingest_run", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid, options: &RunOptions) -> Result<RunReport> {
        info!(input = %options.input_dir.display(), archive = options.archive, "Starting ingestion run");

        let processed = self.ledger.list_processed_files().await?;
        info!(count = processed.len(), "Ledger contains processed files");

        let candidates = discover(&options.input_dir).await?;
        let partition = diff(&candidates, &processed);

        let mut backlog = partition.new_files;
        let mut deferred = 0;
        if let Some(limit) = self.batch_limit {
            if backlog.len() > limit {
                deferred = backlog.len() - limit;
                backlog.truncate(limit);
                info!(limit, deferred, "Batch limit reached, deferring remaining files");
            }
        }
        let scheduled = backlog.len();

        let progress = if options.show_progress {
            file_progress(scheduled as u64)
        } else {
            indicatif::ProgressBar::hidden()
        };

        let processor = FileProcessor::new(self.positions.clone(), self.ledger.clone());
        let schedule = IngestionScheduler::new(processor, self.ledger.clone(), self.workers)
            .with_progress(progress)
            .run(backlog)
            .await?;

        let mut report = RunReport {
            run_id,
            candidates: candidates.len(),
            previously_processed: partition.previously_processed.len(),
            scheduled,
            deferred,
            schedule,
            archive: None,
            archive_error: None,
        };

        if options.archive {
            let files: Vec<PathBuf> = report
                .schedule
                .completed_files
                .iter()
                .cloned()
                .chain(partition.previously_processed)
                .collect();
            let destination = bundle_path(&options.archive_dir, Utc::now(), run_id);

            match self.archiver.archive(files, destination).await {
                Ok(archive) => report.archive = Some(archive),
                Err(e) => {
                    error!(error = %e, "Archival failed, source files left in place");
                    report.archive_error = Some(e.to_string());
                },
            }
        }

        info!(
            completed = report.completed(),
            failed = report.failed(),
            deferred = report.deferred,
            vessels = report.schedule.vessels_flushed,
            "Ingestion run finished"
        );

        Ok(report)
    }
}
