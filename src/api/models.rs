//! Wire models for the NDVI backend and their normalization
//!
//! The backend is loose about shapes: ids may arrive as numbers or strings,
//! dates as RFC 3339, naive ISO timestamps or "March 15, 2025", and numeric
//! fields may be null. Everything is funnelled through here so the rest of
//! the crate only sees validated [`NdviRecord`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::state::data::{HealthBreakdown, NdviRecord, NdviStats, ProjectId};

/// Project as listed by `GET /projects`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ProjectSummary {
    /// Status label; the backend has no status column yet
    pub fn status(&self) -> &'static str {
        "Active"
    }

    pub fn created_label(&self) -> Option<String> {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|t| t.format("%b %-d, %Y").to_string())
    }
}

/// Project as returned by `GET /projects/{id}`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProjectDetail {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Storage key of the newest NDVI raster, used for AI insights
    #[serde(default)]
    pub latest_image_key: Option<String>,
}

/// Body of `POST /projects`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub location: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Raw `GET /geocode` answer; both fields are null when nothing matched
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeocodeResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeocodeResponse {
    pub fn into_coordinates(self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) if latitude.is_finite() && longitude.is_finite() => {
                Some(Coordinates { latitude, longitude })
            }
            _ => None,
        }
    }
}

/// Body of `POST /ai-insights`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InsightRequest {
    pub image_key: String,
    pub coordinates: Coordinates,
    pub user_id: String,
}

/// One processed file in the `POST /projects/{id}/ndvi-process` envelope
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProcessingOutcome {
    pub id: i64,
    pub filename: String,
    #[serde(default)]
    pub s3_url: Option<String>,
    #[serde(default)]
    pub ndvi_min: Option<f64>,
    #[serde(default)]
    pub ndvi_max: Option<f64>,
    #[serde(default)]
    pub ndvi_mean: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub ai_insights: Option<Value>,
}

/// Record shape of `GET /projects/{id}/ndvi` before validation
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireNdviRecord {
    id: Option<Value>,
    date: Option<String>,
    timestamp: Option<String>,
    url: Option<String>,
    original_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    ndvi_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    ndvi_max: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    ndvi_mean: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    healthy_percentage: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    stressed_percentage: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    unhealthy_percentage: Option<f64>,
}

/// A numeric field of any JSON type; anything but a number reads as absent
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

/// Parse any of the timestamp formats the backend emits
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    for format in ["%B %d, %Y", "%Y-%m-%d", "%b %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        }
    }
    None
}

fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0)
}

/// Validate one record object
///
/// Returns None when the record cannot be placed on the timeline at all
/// (no id, no parseable date). Bad statistics only strip `stats`.
pub fn normalize_record(value: Value) -> Option<NdviRecord> {
    let wire: WireNdviRecord = match serde_json::from_value(value) {
        Ok(wire) => wire,
        Err(e) => {
            tracing::warn!("Dropping NDVI record with unexpected shape: {}", e);
            return None;
        }
    };

    let Some(id) = wire.id.as_ref().and_then(parse_id) else {
        tracing::warn!("Dropping NDVI record without a usable id");
        return None;
    };

    let captured_at = wire
        .date
        .as_deref()
        .or(wire.timestamp.as_deref())
        .and_then(parse_timestamp);
    let Some(captured_at) = captured_at else {
        tracing::warn!("Dropping NDVI record {} without a parseable date", id);
        return None;
    };

    let stats = match (wire.ndvi_min, wire.ndvi_max, wire.ndvi_mean) {
        (Some(min), Some(max), Some(mean)) => NdviStats::new(min, max, mean),
        _ => None,
    };
    if stats.is_none() {
        tracing::warn!("NDVI record {} has unusable statistics; it will not be charted", id);
    }

    let display_url = wire.url.unwrap_or_default();
    let original_url = wire.original_url.unwrap_or_else(|| display_url.clone());

    Some(NdviRecord {
        id,
        captured_at,
        display_url,
        original_url,
        thumbnail_url: wire.thumbnail.filter(|t| !t.is_empty()),
        stats,
        health: HealthBreakdown {
            healthy_pct: non_negative(wire.healthy_percentage),
            stressed_pct: non_negative(wire.stressed_percentage),
            unhealthy_pct: non_negative(wire.unhealthy_percentage),
        },
    })
}

/// Validate a whole `GET /projects/{id}/ndvi` payload
///
/// A payload that is not an array is a fetch failure; bad entries inside an
/// array are dropped individually. Order is left as received.
pub fn normalize_records(payload: Value) -> Result<Vec<NdviRecord>, String> {
    match payload {
        Value::Array(items) => Ok(items.into_iter().filter_map(normalize_record).collect()),
        other => Err(format!("expected an array of records, got {}", kind(&other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
