//! AIS Ingest - vessel position file ingestion tool

use ais_common::logging::{init_logging, LogConfig};
use ais_ingest::{
    config::IngestConfig,
    pipeline::{IngestPipeline, RunOptions},
    store::PgStore,
};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ais-ingest")]
#[command(author, version, about = "Ingest AIS position report files into the position store")]
struct Cli {
    /// Directory of position JSON files (defaults to AIS_INPUT_DIR)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Archive and delete source files once they are accounted for
    #[arg(short, long)]
    archive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .log_file_prefix("ais-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    info!("Program has started");

    if let Err(e) = run(cli).await {
        error!(error = %e, "Exiting with error");
        return Err(e);
    }

    info!("Program complete");
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = IngestConfig::from_env()?;
    if let Some(input) = cli.input {
        config = config.with_input_dir(input);
    }

    info!(input = %config.input_dir.display(), "Input directory");
    if cli.archive {
        info!(archive_dir = %config.archive_dir.display(), "Source files are being archived");
    }

    let store = Arc::new(PgStore::connect(&config.database).await?);
    store.migrate().await?;

    let report = IngestPipeline::new(store.clone(), store.clone())
        .with_workers(config.workers)
        .with_batch_limit(config.batch_limit)
        .run(&RunOptions::from_config(&config, cli.archive))
        .await?;

    for (path, reason) in &report.schedule.failed_files {
        warn!(path = %path.display(), reason = %reason, "File left for the next run");
    }
    if let Some(archive) = &report.archive {
        info!(
            bundle = %archive.bundle.display(),
            archived = archive.archived,
            deleted = archive.deleted.len(),
            "Archive summary"
        );
    }

    info!(
        run_id = %report.run_id,
        candidates = report.candidates,
        previously_processed = report.previously_processed,
        completed = report.completed(),
        failed = report.failed(),
        rows = report.schedule.rows_persisted,
        "Run summary"
    );

    store.close().await;
    Ok(())
}
