//! Position file parsing
//!
//! Turns one input file into [`PositionRecord`]s:
//!
//! 1. the batch timestamp comes from the `YYYYMMDD_HHMMSS` token in the file
//!    name, e.g. `20210101_000100.json`
//! 2. the body must be a JSON object with a `data.rows` array
//! 3. every row is coerced; coordinates must be finite floats, optional
//!    numeric fields default to `0` and are kept as strings
//!
//! Any failure is a [`IngestError::Parse`] for the whole file. Nothing is
//! written for a file that does not parse.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{IngestError, Result};
use crate::models::{GeoPoint, PositionPayload, PositionRecord, RawPositionRow, VesselId};

static TIMESTAMP_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8}_\d{6})").expect("timestamp pattern compiles"));

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A parsed input file, alive only while it is being processed
#[derive(Debug, Clone)]
pub struct InputFile {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub rows: Vec<RawPositionRow>,
}

impl InputFile {
    /// Read and parse the file at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let timestamp = parse_filename_timestamp(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IngestError::parse(path, format!("failed to read file: {e}")))?;
        let rows = parse_payload(path, &bytes)?;

        Ok(Self {
            path: path.to_path_buf(),
            timestamp,
            rows,
        })
    }

    /// Coerce every row into a record; the first bad row fails the file
    pub fn records(&self) -> Result<Vec<PositionRecord>> {
        let source = self.path.to_string_lossy();
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                build_record(row, self.timestamp, &source)
                    .map_err(|reason| IngestError::parse(&self.path, format!("row {index}: {reason}")))
            })
            .collect()
    }
}

/// Extract the batch timestamp from the file name
pub fn parse_filename_timestamp(path: &Path) -> Result<DateTime<Utc>> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IngestError::parse(path, "file name is not valid UTF-8"))?;

    let token = TIMESTAMP_TOKEN
        .find(stem)
        .ok_or_else(|| IngestError::parse(path, "file name has no YYYYMMDD_HHMMSS timestamp"))?;

    NaiveDateTime::parse_from_str(token.as_str(), TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| IngestError::parse(path, format!("invalid timestamp '{}': {e}", token.as_str())))
}

/// Parse the JSON body and return its `data.rows` array
pub fn parse_payload(path: &Path, bytes: &[u8]) -> Result<Vec<RawPositionRow>> {
    serde_json::from_slice::<PositionPayload>(bytes)
        .map(|payload| payload.data.rows)
        .map_err(|e| IngestError::parse(path, format!("invalid position payload: {e}")))
}

fn build_record(
    row: &RawPositionRow,
    timestamp: DateTime<Utc>,
    source_file: &str,
) -> std::result::Result<PositionRecord, String> {
    let vessel_id = vessel_id(row.ship_id.as_ref()).ok_or("missing SHIP_ID")?;
    let longitude = coordinate(row.lon.as_ref()).ok_or("LON is not a number")?;
    let latitude = coordinate(row.lat.as_ref()).ok_or("LAT is not a number")?;

    Ok(PositionRecord {
        vessel_id,
        name: text(row.shipname.as_ref()),
        destination: text(row.destination.as_ref()),
        heading: numeric_text(row.heading.as_ref()),
        timestamp,
        position: GeoPoint {
            longitude,
            latitude,
        },
        length: numeric_text(row.length.as_ref()),
        width: numeric_text(row.width.as_ref()),
        rotation: numeric_text(row.rot.as_ref()),
        speed: numeric_text(row.speed.as_ref()),
        vessel_type: numeric_text(row.shiptype.as_ref()),
        source_file: source_file.to_string(),
    })
}

fn vessel_id(value: Option<&Value>) -> Option<VesselId> {
    match value? {
        Value::Number(n) => Some(VesselId::new(n.to_string())),
        Value::String(s) if !s.trim().is_empty() => Some(VesselId::new(s.trim())),
        _ => None,
    }
}

fn coordinate(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Missing numeric fields default to zero before being stringified
fn numeric_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "0".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn row(value: Value) -> RawPositionRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_timestamp_from_plain_name() {
        let ts = parse_filename_timestamp(Path::new("/data/20210101_000100.json")).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2021, 1, 1));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (0, 1, 0));
    }

    #[test]
    fn test_timestamp_ignores_directory_digits() {
        let ts =
            parse_filename_timestamp(Path::new("/mnt/19990101_000000/ais_20200315_123045.json"))
                .unwrap();
        assert_eq!(ts.year(), 2020);
        assert_eq!(ts.hour(), 12);
    }

    #[test]
    fn test_timestamp_missing_token_is_parse_error() {
        let err = parse_filename_timestamp(Path::new("/data/latest.json")).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn test_timestamp_invalid_calendar_date_is_parse_error() {
        let err = parse_filename_timestamp(Path::new("/data/20211341_250000.json")).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn test_payload_requires_nested_rows() {
        let path = Path::new("/data/20210101_000000.json");
        assert!(parse_payload(path, br#"{"rows": []}"#).is_err());
        assert!(parse_payload(path, b"not json").is_err());
        assert_eq!(parse_payload(path, br#"{"data": {"rows": []}}"#).unwrap().len(), 0);
    }

    #[test]
    fn test_record_coercion_defaults_missing_numbers_to_zero() {
        let raw = row(json!({"SHIP_ID": 42, "LON": "23.5", "LAT": 37.9, "SPEED": 112}));
        let ts = parse_filename_timestamp(Path::new("20210101_000000.json")).unwrap();
        let record = build_record(&raw, ts, "/data/20210101_000000.json").unwrap();

        assert_eq!(record.vessel_id, VesselId::from(42));
        assert_eq!(record.position, GeoPoint { longitude: 23.5, latitude: 37.9 });
        assert_eq!(record.speed, "112");
        assert_eq!(record.heading, "0");
        assert_eq!(record.width, "0");
        assert_eq!(record.name, "");
    }

    #[test]
    fn test_string_and_numeric_ship_ids_are_the_same_vessel() {
        let a = vessel_id(Some(&json!(7))).unwrap();
        let b = vessel_id(Some(&json!("7"))).unwrap();
        assert_eq!(a, b);
        assert!(vessel_id(Some(&json!(""))).is_none());
        assert!(vessel_id(None).is_none());
    }

    #[test]
    fn test_non_numeric_coordinate_rejected() {
        assert!(coordinate(Some(&json!("north"))).is_none());
        assert!(coordinate(Some(&json!("NaN"))).is_none());
        assert!(coordinate(Some(&json!(null))).is_none());
        assert_eq!(coordinate(Some(&json!(" -3.25 "))), Some(-3.25));
    }

    #[test]
    fn test_records_reports_bad_row_index() {
        let file = InputFile {
            path: PathBuf::from("/data/20210101_000000.json"),
            timestamp: Utc::now(),
            rows: vec![
                row(json!({"SHIP_ID": 1, "LON": 1.0, "LAT": 2.0})),
                row(json!({"SHIP_ID": 2, "LON": "east", "LAT": 2.0})),
            ],
        };
        let err = file.records().unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
