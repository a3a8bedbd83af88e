/// NDVI trend chart
/// Min, max and mean series over time, rasterized with tiny-skia
///
/// Geometry is computed separately from painting so the text overlay (dates,
/// tick values, legend labels) drawn by iced lines up with the raster.
use std::sync::Arc;

use iced::widget::image;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::state::data::NdviRecord;

/// Space between the plot area and the raster edge
pub const PADDING: f32 = 40.0;

/// Headroom added below the lowest minimum and above the highest maximum
const Y_MARGIN: f64 = 0.1;

const MARKER_RADIUS: f32 = 4.0;
const LEGEND_INSET: f32 = 150.0;
const LEGEND_SPACING: f32 = 20.0;
const LEGEND_SWATCH: f32 = 20.0;
const Y_TICKS: usize = 5;

/// One plotted series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Min,
    Max,
    Mean,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::Min, Series::Max, Series::Mean];

    /// RGBA components
    pub fn rgba(&self) -> [u8; 4] {
        match self {
            Series::Min => [255, 0, 0, 128],
            Series::Max => [0, 255, 0, 128],
            Series::Mean => [0xef, 0xc8, 0x7d, 255],
        }
    }

    pub fn stroke_width(&self) -> f32 {
        match self {
            Series::Mean => 2.0,
            _ => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Series::Min => "Min NDVI",
            Series::Max => "Max NDVI",
            Series::Mean => "Mean NDVI",
        }
    }
}

/// Pixel position of one record
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub record_id: i64,
    pub x: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub y_mean: f32,
    /// Axis label, e.g. "Mar 15"
    pub label: String,
}

impl ChartPoint {
    fn y(&self, series: Series) -> f32 {
        match series {
            Series::Min => self.y_min,
            Series::Max => self.y_max,
            Series::Mean => self.y_mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub series: Series,
    /// Left end of the swatch line
    pub x: f32,
    pub y: f32,
}

/// Everything needed to paint the chart and place its labels
#[derive(Debug, Clone, PartialEq)]
pub struct ChartGeometry {
    pub width: u32,
    pub height: u32,
    /// NDVI value at the bottom and top of the plot area
    pub y_range: (f64, f64),
    pub points: Vec<ChartPoint>,
    /// (pixel y, value label) from bottom to top
    pub y_ticks: Vec<(f32, String)>,
    pub legend: Vec<LegendEntry>,
}

impl ChartGeometry {
    /// Map the records (ascending by time) onto a `width` x `height` raster
    ///
    /// Records without usable statistics are skipped. Returns None when no
    /// record can be plotted or the raster is too small for the padding.
    pub fn compute(records: &[NdviRecord], width: u32, height: u32) -> Option<Self> {
        let plotted: Vec<_> = records
            .iter()
            .filter_map(|r| r.stats.map(|s| (r, s)))
            .collect();
        if plotted.is_empty() {
            return None;
        }

        let chart_width = width as f32 - 2.0 * PADDING;
        let chart_height = height as f32 - 2.0 * PADDING;
        if chart_width <= 0.0 || chart_height <= 0.0 {
            return None;
        }

        let low = plotted.iter().map(|(_, s)| s.min()).fold(f64::INFINITY, f64::min) - Y_MARGIN;
        let high = plotted.iter().map(|(_, s)| s.max()).fold(f64::NEG_INFINITY, f64::max) + Y_MARGIN;
        let span = high - low;
        if !span.is_finite() || span <= 0.0 {
            return None;
        }

        let to_y = |value: f64| -> f32 {
            let t = ((value - low) / span) as f32;
            PADDING + chart_height - t * chart_height
        };

        let count = plotted.len();
        let x_step = if count > 1 {
            chart_width / (count - 1) as f32
        } else {
            chart_width
        };
        let to_x = |i: usize| -> f32 {
            if count == 1 {
                PADDING + x_step / 2.0
            } else {
                PADDING + i as f32 * x_step
            }
        };

        let points = plotted
            .iter()
            .enumerate()
            .map(|(i, (record, stats))| ChartPoint {
                record_id: record.id,
                x: to_x(i),
                y_min: to_y(stats.min()),
                y_max: to_y(stats.max()),
                y_mean: to_y(stats.mean()),
                label: record.short_date_label(),
            })
            .collect();

        let y_ticks = (0..Y_TICKS)
            .map(|i| {
                let value = low + span * i as f64 / (Y_TICKS - 1) as f64;
                (to_y(value), format!("{value:.2}"))
            })
            .collect();

        let legend_x = width as f32 - LEGEND_INSET;
        let legend = Series::ALL
            .iter()
            .enumerate()
            .map(|(i, &series)| LegendEntry {
                series,
                x: legend_x,
                y: PADDING + LEGEND_SPACING + i as f32 * LEGEND_SPACING,
            })
            .collect();

        Some(Self {
            width,
            height,
            y_range: (low, high),
            points,
            y_ticks,
            legend,
        })
    }

    /// Bottom edge of the plot area
    pub fn baseline(&self) -> f32 {
        self.height as f32 - PADDING
    }
}

fn paint(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = true;
    paint
}

fn stroke(width: f32) -> Stroke {
    Stroke {
        width,
        ..Stroke::default()
    }
}

/// Paint the chart onto an opaque white raster
///
/// Pure: the same geometry always yields the same pixels.
pub fn render_chart(geometry: &ChartGeometry) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(geometry.width, geometry.height)?;
    pixmap.fill(Color::WHITE);

    let (w, h) = (geometry.width as f32, geometry.height as f32);

    // Axes
    let mut axes = PathBuilder::new();
    axes.move_to(PADDING, PADDING);
    axes.line_to(PADDING, h - PADDING);
    axes.line_to(w - PADDING, h - PADDING);
    if let Some(path) = axes.finish() {
        pixmap.stroke_path(&path, &paint([0x66, 0x66, 0x66, 255]), &stroke(1.0), Transform::identity(), None);
    }

    for series in Series::ALL {
        let mut line = PathBuilder::new();
        for (i, point) in geometry.points.iter().enumerate() {
            if i == 0 {
                line.move_to(point.x, point.y(series));
            } else {
                line.line_to(point.x, point.y(series));
            }
        }
        // A single point has no segment to draw
        if let Some(path) = line.finish() {
            pixmap.stroke_path(
                &path,
                &paint(series.rgba()),
                &stroke(series.stroke_width()),
                Transform::identity(),
                None,
            );
        }
    }

    let marker = paint([0x4f, 0x53, 0x1f, 255]);
    for point in &geometry.points {
        if let Some(circle) = PathBuilder::from_circle(point.x, point.y_mean, MARKER_RADIUS) {
            pixmap.fill_path(&circle, &marker, FillRule::Winding, Transform::identity(), None);
        }
    }

    for entry in &geometry.legend {
        let mut swatch = PathBuilder::new();
        swatch.move_to(entry.x, entry.y);
        swatch.line_to(entry.x + LEGEND_SWATCH, entry.y);
        if let Some(path) = swatch.finish() {
            pixmap.stroke_path(
                &path,
                &paint(entry.series.rgba()),
                &stroke(entry.series.stroke_width()),
                Transform::identity(),
                None,
            );
        }
    }

    Some(pixmap)
}

/// Rendered chart, reused until the record set or the size changes
#[derive(Debug, Default)]
pub struct ChartCache {
    source: Option<Arc<[NdviRecord]>>,
    size: (u32, u32),
    geometry: Option<ChartGeometry>,
    handle: Option<image::Handle>,
    renders: u64,
}

impl ChartCache {
    /// Re-render if `records` is a different set or the size changed
    ///
    /// Returns true when a new raster was produced.
    pub fn refresh(&mut self, records: &Arc<[NdviRecord]>, width: u32, height: u32) -> bool {
        let unchanged = self
            .source
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, records))
            && self.size == (width, height);
        if unchanged {
            return false;
        }

        self.source = Some(Arc::clone(records));
        self.size = (width, height);
        self.geometry = ChartGeometry::compute(records, width, height);
        // The background is opaque, so premultiplied bytes equal straight RGBA
        self.handle = self
            .geometry
            .as_ref()
            .and_then(render_chart)
            .map(|pixmap| image::Handle::from_rgba(width, height, pixmap.take()));
        self.renders += 1;
        tracing::debug!("Rendered NDVI chart ({} points)", self.geometry.as_ref().map_or(0, |g| g.points.len()));
        true
    }

    pub fn geometry(&self) -> Option<&ChartGeometry> {
        self.geometry.as_ref()
    }

    pub fn handle(&self) -> Option<&image::Handle> {
        self.handle.as_ref()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::results::tests::record;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn three_records() -> Vec<NdviRecord> {
        vec![
            record(1, 1, -0.2, 0.8),
            record(2, 8, -0.15, 0.75),
            record(3, 15, -0.25, 0.7),
        ]
    }

    #[test]
    fn test_y_range_adds_margin() {
        let geometry = ChartGeometry::compute(&three_records(), 720, 300).unwrap();
        let (low, high) = geometry.y_range;
        assert!(approx(low, -0.35), "low = {low}");
        assert!(approx(high, 0.9), "high = {high}");
    }

    #[test]
    fn test_higher_values_are_drawn_higher() {
        let geometry = ChartGeometry::compute(&three_records(), 720, 300).unwrap();
        for point in &geometry.points {
            assert!(point.y_max < point.y_mean && point.y_mean < point.y_min);
        }
        assert_eq!(geometry.points[0].x, PADDING);
        assert_eq!(geometry.points[2].x, 720.0 - PADDING);
    }

    #[test]
    fn test_single_record_sits_at_center() {
        let geometry = ChartGeometry::compute(&[record(1, 1, 0.1, 0.5)], 720, 300).unwrap();
        assert_eq!(geometry.points.len(), 1);
        assert_eq!(geometry.points[0].x, 360.0);
        assert!(geometry.points[0].y_mean.is_finite());
        assert!(render_chart(&geometry).is_some());
    }

    #[test]
    fn test_unrenderable_records_are_skipped() {
        let mut broken = record(9, 4, 0.0, 0.5);
        broken.stats = None;

        assert!(ChartGeometry::compute(&[broken.clone()], 720, 300).is_none());

        let geometry = ChartGeometry::compute(&[record(1, 1, 0.0, 0.4), broken], 720, 300).unwrap();
        assert_eq!(geometry.points.len(), 1);
    }

    #[test]
    fn test_too_small_canvas() {
        assert!(ChartGeometry::compute(&three_records(), 80, 300).is_none());
    }

    #[test]
    fn test_legend_position() {
        let geometry = ChartGeometry::compute(&three_records(), 720, 300).unwrap();
        let ys: Vec<_> = geometry.legend.iter().map(|e| e.y).collect();
        assert_eq!(geometry.legend[0].x, 570.0);
        assert_eq!(ys, [60.0, 80.0, 100.0]);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let geometry = ChartGeometry::compute(&three_records(), 720, 300).unwrap();
        let first = render_chart(&geometry).unwrap();
        let second = render_chart(&ChartGeometry::compute(&three_records(), 720, 300).unwrap()).unwrap();
        assert_eq!(first.data(), second.data());
    }

    #[test]
    fn test_marker_color_at_mean_point() {
        let geometry = ChartGeometry::compute(&three_records(), 720, 300).unwrap();
        let pixmap = render_chart(&geometry).unwrap();
        let point = &geometry.points[1];

        let pixel = pixmap
            .pixel(point.x as u32, point.y_mean as u32)
            .unwrap()
            .demultiply();
        let close = |a: u8, b: u8| a.abs_diff(b) <= 2;
        assert!(close(pixel.red(), 0x4f) && close(pixel.green(), 0x53) && close(pixel.blue(), 0x1f));
    }

    #[test]
    fn test_cache_rerenders_only_on_new_records_or_size() {
        let records: Arc<[NdviRecord]> = Arc::from(three_records());
        let mut cache = ChartCache::default();

        assert!(cache.refresh(&records, 720, 300));
        assert!(!cache.refresh(&records, 720, 300));
        assert!(cache.refresh(&records, 640, 300));

        let reloaded: Arc<[NdviRecord]> = Arc::from(three_records());
        assert!(cache.refresh(&reloaded, 640, 300));
        assert_eq!(cache.renders(), 3);
        assert!(cache.handle().is_some());
    }
}
