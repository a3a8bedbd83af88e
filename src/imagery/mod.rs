/// Imagery module
///
/// This module handles:
/// - Downloading NDVI renderings and source imagery for the viewer
/// - Generating timeline thumbnails
/// - Caching thumbnails to disk

pub mod preview;
pub mod thumbnail;
