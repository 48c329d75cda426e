//! Position report data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Vessel identifier
// ============================================================================

/// Upstream vessel identifier (`SHIP_ID`), kept in its textual form
///
/// The feed sends it either as a JSON number or a string; both normalise to
/// the same key so that `1` and `"1"` name one vessel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VesselId(String);

impl VesselId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for VesselId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// Raw feed payload
// ============================================================================

/// Top-level file document: `{ "data": { "rows": [...] } }`
#[derive(Debug, Clone, Deserialize)]
pub struct PositionPayload {
    pub data: PayloadData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadData {
    pub rows: Vec<RawPositionRow>,
}

/// One row exactly as the feed delivers it
///
/// Every field is optional and loosely typed; coercion happens in
/// [`crate::parser`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPositionRow {
    #[serde(rename = "SHIP_ID", default)]
    pub ship_id: Option<serde_json::Value>,
    #[serde(rename = "SHIPNAME", default)]
    pub shipname: Option<serde_json::Value>,
    #[serde(rename = "DESTINATION", default)]
    pub destination: Option<serde_json::Value>,
    #[serde(rename = "HEADING", default)]
    pub heading: Option<serde_json::Value>,
    #[serde(rename = "LON", default)]
    pub lon: Option<serde_json::Value>,
    #[serde(rename = "LAT", default)]
    pub lat: Option<serde_json::Value>,
    #[serde(rename = "LENGTH", default)]
    pub length: Option<serde_json::Value>,
    #[serde(rename = "ROT", default)]
    pub rot: Option<serde_json::Value>,
    #[serde(rename = "SHIPTYPE", default)]
    pub shiptype: Option<serde_json::Value>,
    #[serde(rename = "SPEED", default)]
    pub speed: Option<serde_json::Value>,
    #[serde(rename = "WIDTH", default)]
    pub width: Option<serde_json::Value>,
}

// ============================================================================
// Persisted records
// ============================================================================

/// Geographic point, longitude first as in GeoJSON
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

/// A single vessel position observation, written once and never updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub vessel_id: VesselId,
    pub name: String,
    pub destination: String,
    pub heading: String,
    /// Batch timestamp taken from the source file name
    pub timestamp: DateTime<Utc>,
    pub position: GeoPoint,
    pub length: String,
    pub width: String,
    pub rotation: String,
    pub speed: String,
    pub vessel_type: String,
    /// Absolute path of the file the row came from
    pub source_file: String,
}
