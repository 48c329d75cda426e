//! Archival of fully ingested source files
//!
//! Files are bundled into one `.tar.gz` keyed by basename, so extracting the
//! bundle into a directory gives back flat file names. Source files are
//! deleted only after the bundle has been completely written; a failed
//! compression deletes nothing. Individual delete failures are reported and
//! leave the bundle in place. An existing bundle is never replaced.

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{IngestError, Result};

/// Compression and deletion primitives used by [`Archiver`]
pub trait ArchiveBackend: Send + Sync {
    /// Write all `files` into one new bundle at `destination`
    ///
    /// Fails with `AlreadyExists` rather than replacing an existing file.
    fn compress(&self, files: &[PathBuf], destination: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// gzip-compressed tar bundles on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzBackend;

impl ArchiveBackend for TarGzBackend {
    fn compress(&self, files: &[PathBuf], destination: &Path) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if destination.try_exists()? {
            return Err(already_exists(destination));
        }

        // Written under a temporary name so a partial bundle never looks finished.
        // `create_new` keeps a concurrent writer of the same name out.
        let partial = partial_path(destination);
        let target = OpenOptions::new().write(true).create_new(true).open(&partial)?;

        let result = write_bundle(files, target).and_then(|()| publish(&partial, destination));
        if result.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        result
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

fn write_bundle(files: &[PathBuf], target: File) -> io::Result<()> {
    let encoder = GzEncoder::new(target, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for file in files {
        let name = file.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' has no file name", file.display()),
            )
        })?;
        builder.append_path_with_name(file, name)?;
    }

    builder.into_inner()?.finish()?.sync_all()
}

/// Move the finished bundle to its final name without clobbering
fn publish(partial: &Path, destination: &Path) -> io::Result<()> {
    if destination.try_exists()? {
        return Err(already_exists(destination));
    }
    std::fs::rename(partial, destination)
}

fn already_exists(destination: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("bundle '{}' already exists", destination.display()),
    )
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

/// Bundle path for run `run_id` finishing at `at`
///
/// The run id suffix keeps runs finishing within the same second apart.
pub fn bundle_path(archive_dir: &Path, at: DateTime<Utc>, run_id: Uuid) -> PathBuf {
    archive_dir.join(format!(
        "ais-positions-{}-{}.tar.gz",
        at.format("%Y%m%d_%H%M%S"),
        run_id.simple()
    ))
}

/// What an archive pass did
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    pub bundle: PathBuf,
    pub archived: usize,
    pub deleted: Vec<PathBuf>,
    pub delete_failures: Vec<(PathBuf, String)>,
}

impl ArchiveReport {
    pub fn is_clean(&self) -> bool {
        self.delete_failures.is_empty()
    }
}

pub struct Archiver {
    backend: Arc<dyn ArchiveBackend>,
}

impl Default for Archiver {
    fn default() -> Self {
        Self::new(Arc::new(TarGzBackend))
    }
}

impl Archiver {
    pub fn new(backend: Arc<dyn ArchiveBackend>) -> Self {
        Self { backend }
    }

    /// Bundle `files` at `destination`, then delete exactly those files
    pub async fn archive(&self, files: Vec<PathBuf>, destination: PathBuf) -> Result<ArchiveReport> {
        if files.is_empty() {
            info!("Nothing to archive");
            return Ok(ArchiveReport {
                bundle: destination,
                ..ArchiveReport::default()
            });
        }

        let backend = self.backend.clone();
        let report = tokio::task::spawn_blocking(move || bundle_then_delete(backend.as_ref(), files, destination))
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))??;

        if !report.is_clean() {
            error!(
                failures = report.delete_failures.len(),
                "Some archived files could not be deleted and remain on disk"
            );
        }

        Ok(report)
    }
}

fn bundle_then_delete(
    backend: &dyn ArchiveBackend,
    files: Vec<PathBuf>,
    destination: PathBuf,
) -> Result<ArchiveReport> {
    backend.compress(&files, &destination).map_err(|e| {
        IngestError::Archive(format!("failed to write bundle '{}': {e}", destination.display()))
    })?;

    info!(bundle = %destination.display(), files = files.len(), "Archive bundle written");

    let mut report = ArchiveReport {
        bundle: destination,
        archived: files.len(),
        ..ArchiveReport::default()
    };

    for file in files {
        match backend.remove(&file) {
            Ok(()) => report.deleted.push(file),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Failed to delete archived file");
                report.delete_failures.push((file, e.to_string()));
            },
        }
    }

    Ok(report)
}
