/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the API layer and the UI layer.
use chrono::{DateTime, Utc};

/// Backend identifier of a project
pub type ProjectId = i64;

/// Summary statistics of one NDVI raster
///
/// Only constructed through [`NdviStats::new`], which enforces
/// `-1 <= min <= mean <= max <= 1` with finite values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NdviStats {
    min: f64,
    max: f64,
    mean: f64,
}

impl NdviStats {
    /// Validate raw statistics; returns None for anything the chart cannot plot
    pub fn new(min: f64, max: f64, mean: f64) -> Option<Self> {
        let in_range = |v: f64| v.is_finite() && (-1.0..=1.0).contains(&v);
        if !(in_range(min) && in_range(max) && in_range(mean)) {
            return None;
        }
        if min > mean || mean > max {
            return None;
        }
        Some(Self { min, max, mean })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }
}

/// Share of the field in each vegetation health class (percent)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HealthBreakdown {
    pub healthy_pct: f64,
    pub stressed_pct: f64,
    pub unhealthy_pct: f64,
}

/// One computed NDVI result for a project
///
/// Never mutated after load; a refresh replaces the whole set.
#[derive(Debug, Clone, PartialEq)]
pub struct NdviRecord {
    /// Unique within the project
    pub id: i64,
    /// Capture time, used for chronological ordering
    pub captured_at: DateTime<Utc>,
    /// Rendered NDVI image
    pub display_url: String,
    /// Source imagery (JPEG preview of the upload)
    pub original_url: String,
    /// Optional smaller image for the timeline strip
    pub thumbnail_url: Option<String>,
    /// None when the backend sent missing or inconsistent numbers
    pub stats: Option<NdviStats>,
    pub health: HealthBreakdown,
}

impl NdviRecord {
    /// Whether the statistics renderer can plot this record
    pub fn is_renderable(&self) -> bool {
        self.stats.is_some()
    }

    /// Image used for the timeline thumbnail
    pub fn thumbnail_source(&self) -> &str {
        self.thumbnail_url.as_deref().unwrap_or(&self.display_url)
    }

    /// Long date label, e.g. "March 15, 2025"
    pub fn date_label(&self) -> String {
        self.captured_at.format("%B %-d, %Y").to_string()
    }

    /// Short axis label, e.g. "Mar 15"
    pub fn short_date_label(&self) -> String {
        self.captured_at.format("%b %-d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stats_enforce_ordering() {
        assert!(NdviStats::new(-0.2, 0.8, 0.3).is_some());
        assert!(NdviStats::new(0.5, 0.8, 0.3).is_none());
        assert!(NdviStats::new(-0.2, 0.1, 0.3).is_none());
    }

    #[test]
    fn test_stats_reject_nan_and_out_of_range() {
        assert!(NdviStats::new(f64::NAN, 0.8, 0.3).is_none());
        assert!(NdviStats::new(-1.5, 0.8, 0.3).is_none());
        assert!(NdviStats::new(-0.2, f64::INFINITY, 0.3).is_none());
    }

    #[test]
    fn test_date_labels() {
        let record = NdviRecord {
            id: 1,
            captured_at: Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap(),
            display_url: "https://img/ndvi.jpg".to_string(),
            original_url: "https://img/orig.jpg".to_string(),
            thumbnail_url: None,
            stats: None,
            health: HealthBreakdown::default(),
        };

        assert_eq!(record.date_label(), "March 5, 2025");
        assert_eq!(record.short_date_label(), "Mar 5");
        assert_eq!(record.thumbnail_source(), "https://img/ndvi.jpg");
        assert!(!record.is_renderable());
    }
}
