/// Full-size images for the viewer
/// Downloads the NDVI rendering or the source imagery of one record
use crate::api::ApiClient;
use crate::error::ThumbnailError;
use crate::state::data::NdviRecord;

/// Which image of a record the viewer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayer {
    #[default]
    Ndvi,
    Original,
}

impl ImageLayer {
    pub fn url<'a>(&self, record: &'a NdviRecord) -> &'a str {
        match self {
            ImageLayer::Ndvi => &record.display_url,
            ImageLayer::Original => &record.original_url,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageLayer::Ndvi => "NDVI",
            ImageLayer::Original => "Original",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ImageLayer::Ndvi => ImageLayer::Original,
            ImageLayer::Original => ImageLayer::Ndvi,
        }
    }
}

/// Download one layer of a record
///
/// The bytes are checked to be a known image format so the viewer never
/// receives an HTML error page as an image.
pub async fn fetch_preview(
    api: ApiClient,
    record: NdviRecord,
    layer: ImageLayer,
) -> Result<Vec<u8>, ThumbnailError> {
    let bytes = api.fetch_bytes(layer.url(&record)).await?;
    image::guess_format(&bytes)?;
    tracing::debug!(
        "Fetched {} preview for record {} ({:.1} KB)",
        layer.label(),
        record.id,
        bytes.len() as f64 / 1024.0
    );
    Ok(bytes)
}

/// Viewer zoom in percent, stepped and bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zoom(u16);

impl Zoom {
    pub const MIN: u16 = 50;
    pub const MAX: u16 = 200;
    pub const STEP: u16 = 10;

    pub fn percent(&self) -> u16 {
        self.0
    }

    pub fn scale(&self) -> f32 {
        f32::from(self.0) / 100.0
    }

    pub fn zoom_in(&mut self) {
        self.0 = (self.0 + Self::STEP).min(Self::MAX);
    }

    pub fn zoom_out(&mut self) {
        self.0 = self.0.saturating_sub(Self::STEP).max(Self::MIN);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Zoom(100)
    }
}
