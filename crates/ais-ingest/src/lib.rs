//! AIS Ingest Library
//!
//! Incremental ingestion of timestamped vessel position files into a
//! durable store.
//!
//! Each run lists the `*.json` files of an input directory, skips those the
//! ledger already knows, and processes the rest with a small worker pool.
//! A file is marked processed only after all of its rows are stored, so a
//! re-run picks up exactly the files that did not finish. Vessels seen in
//! the run are queued for enrichment, and accounted-for files can be
//! bundled into a `.tar.gz` and removed.
//!
//! # Example
//!
//! ```no_run
//! use ais_ingest::{config::IngestConfig, pipeline::{IngestPipeline, RunOptions}, store::PgStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let store = Arc::new(PgStore::connect(&config.database).await?);
//!     store.migrate().await?;
//!
//!     let report = IngestPipeline::new(store.clone(), store)
//!         .with_workers(config.workers)
//!         .run(&RunOptions::from_config(&config, false))
//!         .await?;
//!     println!("{} files ingested", report.completed());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod discovery;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod scheduler;
pub mod store;

pub use error::{IngestError, Result, StoreError};
