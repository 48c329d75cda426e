//! Shared test fixtures: an in-memory store with failure injection and
//! position file writers.

#![allow(dead_code)]

use ais_ingest::archive::{ArchiveBackend, TarGzBackend};
use ais_ingest::models::{PositionRecord, VesselId};
use ais_ingest::store::{PositionStore, ProcessedLedger, StoreResult};
use ais_ingest::StoreError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ais_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct MemoryStore {
    positions: Mutex<Vec<PositionRecord>>,
    processed: Mutex<HashSet<String>>,
    mark_calls: Mutex<Vec<String>>,
    todos: Mutex<BTreeSet<VesselId>>,
    todo_calls: Mutex<usize>,
    failing_vessels: Mutex<HashSet<VesselId>>,
    failing_markers: Mutex<HashSet<String>>,
    connection_lost: AtomicBool,
    inserts_before_drop: Mutex<Option<usize>>,
    drop_on_marker: AtomicBool,
    drop_on_todo: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend an earlier run already marked `path`
    pub fn seed_processed(&self, path: &Path) {
        self.processed
            .lock()
            .unwrap()
            .insert(path.to_string_lossy().to_string());
    }

    /// Row inserts for this vessel fail with a query error
    pub fn fail_rows_for(&self, ship_id: i64) {
        self.failing_vessels.lock().unwrap().insert(VesselId::from(ship_id));
    }

    pub fn fail_marker_for(&self, path: &Path) {
        self.failing_markers
            .lock()
            .unwrap()
            .insert(path.to_string_lossy().to_string());
    }

    pub fn lose_connection(&self) {
        self.connection_lost.store(true, Ordering::SeqCst);
    }

    /// Let `count` row inserts succeed, then lose the connection for good
    pub fn drop_connection_after_inserts(&self, count: usize) {
        *self.inserts_before_drop.lock().unwrap() = Some(count);
    }

    /// Lose the connection on the first marker write
    pub fn drop_connection_on_marker(&self) {
        self.drop_on_marker.store(true, Ordering::SeqCst);
    }

    /// Lose the connection on the first todo upsert
    pub fn drop_connection_on_todo(&self) {
        self.drop_on_todo.store(true, Ordering::SeqCst);
    }

    pub fn positions(&self) -> Vec<PositionRecord> {
        self.positions.lock().unwrap().clone()
    }

    pub fn processed(&self) -> HashSet<String> {
        self.processed.lock().unwrap().clone()
    }

    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed
            .lock()
            .unwrap()
            .contains(path.to_string_lossy().as_ref())
    }

    pub fn mark_calls(&self) -> Vec<String> {
        self.mark_calls.lock().unwrap().clone()
    }

    pub fn todos(&self) -> BTreeSet<VesselId> {
        self.todos.lock().unwrap().clone()
    }

    pub fn todo_calls(&self) -> usize {
        *self.todo_calls.lock().unwrap()
    }

    fn drop_if(&self, armed: &AtomicBool) -> StoreResult<()> {
        if armed.load(Ordering::SeqCst) {
            self.lose_connection();
        }
        self.check_connection()
    }

    fn check_connection(&self) -> StoreResult<()> {
        if self.connection_lost.load(Ordering::SeqCst) {
            Err(StoreError::Connection("connection reset by peer".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProcessedLedger for MemoryStore {
    async fn list_processed_files(&self) -> StoreResult<HashSet<String>> {
        self.check_connection()?;
        Ok(self.processed())
    }

    async fn mark_file_processed(&self, path: &str) -> StoreResult<()> {
        self.drop_if(&self.drop_on_marker)?;
        self.mark_calls.lock().unwrap().push(path.to_string());
        if self.failing_markers.lock().unwrap().contains(path) {
            return Err(StoreError::Query("unique index is corrupt".to_string()));
        }
        self.processed.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    async fn upsert_vessel_todo(&self, vessel_id: &VesselId) -> StoreResult<()> {
        self.drop_if(&self.drop_on_todo)?;
        *self.todo_calls.lock().unwrap() += 1;
        self.todos.lock().unwrap().insert(vessel_id.clone());
        Ok(())
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn insert_position(&self, record: &PositionRecord) -> StoreResult<()> {
        self.check_connection()?;
        if let Some(remaining) = self.inserts_before_drop.lock().unwrap().as_mut() {
            if *remaining == 0 {
                self.lose_connection();
                return self.check_connection();
            }
            *remaining -= 1;
        }
        if self.failing_vessels.lock().unwrap().contains(&record.vessel_id) {
            return Err(StoreError::Query(format!(
                "insert rejected for vessel {}",
                record.vessel_id
            )));
        }
        self.positions.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Tar backend that records every call and can be told to fail compression
#[derive(Default)]
pub struct RecordingBackend {
    pub compressed: Mutex<Vec<Vec<PathBuf>>>,
    pub removed: Mutex<Vec<PathBuf>>,
    pub fail_compress: AtomicBool,
}

impl ArchiveBackend for RecordingBackend {
    fn compress(&self, files: &[PathBuf], destination: &Path) -> io::Result<()> {
        if self.fail_compress.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        TarGzBackend.compress(files, destination)?;
        self.compressed.lock().unwrap().push(files.to_vec());
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.removed.lock().unwrap().push(path.to_path_buf());
        TarGzBackend.remove(path)
    }
}

/// A feed row with the minimum fields needed to parse
pub fn position_row(ship_id: i64, lon: f64, lat: f64) -> Value {
    json!({
        "SHIP_ID": ship_id,
        "SHIPNAME": format!("VESSEL {ship_id}"),
        "DESTINATION": "PIRAEUS",
        "HEADING": "180",
        "LON": lon.to_string(),
        "LAT": lat.to_string(),
        "LENGTH": 120,
        "ROT": 0,
        "SHIPTYPE": "7",
        "SPEED": 104,
        "WIDTH": 20
    })
}

/// Write `{ "data": { "rows": rows } }` to `dir/name`
pub fn write_position_file(dir: &Path, name: &str, rows: Vec<Value>) -> PathBuf {
    let path = dir.join(name);
    let body = json!({ "type": 1, "data": { "rows": rows, "areaShips": 0 } });
    std::fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();
    path
}

pub fn write_raw_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Entry names inside a `.tar.gz` bundle
pub fn bundle_entries(bundle: &Path) -> BTreeSet<String> {
    let file = std::fs::File::open(bundle).unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect()
}
