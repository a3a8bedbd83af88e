use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ApiClient;
use crate::error::ThumbnailError;
use crate::state::data::{NdviRecord, ProjectId};

/// Default edge length of generated thumbnails (square bound)
pub const THUMBNAIL_SIZE: u32 = 256;

/// Get the thumbnail cache directory
/// Returns ~/.cache/field-monitor/thumbnails on Linux
pub fn thumbnail_cache_dir() -> Result<PathBuf, ThumbnailError> {
    let mut path = dirs::cache_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| {
            ThumbnailError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine cache directory",
            ))
        })?;

    path.push("field-monitor");
    path.push("thumbnails");
    fs::create_dir_all(&path)?;

    Ok(path)
}

/// Cache file for one record (doesn't generate, just returns the expected path)
pub fn thumbnail_path(cache_dir: &Path, project: ProjectId, record_id: i64) -> PathBuf {
    cache_dir.join(format!("{}_{}.png", project, record_id))
}

/// Downloads, scales and caches timeline thumbnails
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    api: ApiClient,
    dir: PathBuf,
    size: u32,
}

impl ThumbnailCache {
    pub fn new(api: ApiClient, dir: PathBuf, size: u32) -> Self {
        Self { api, dir, size }
    }

    /// Cache under the user cache directory
    pub fn in_user_cache(api: ApiClient, size: u32) -> Result<Self, ThumbnailError> {
        Ok(Self::new(api, thumbnail_cache_dir()?, size))
    }

    /// Path of a cached thumbnail, generating it first if needed
    pub async fn get(&self, project: ProjectId, record: &NdviRecord) -> Result<PathBuf, ThumbnailError> {
        let path = thumbnail_path(&self.dir, project, record.id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }

        let bytes = self
            .api
            .fetch_bytes(record.thumbnail_source())
            .await
            .map_err(ThumbnailError::Fetch)?;

        let size = self.size;
        let target = path.clone();
        // Decoding and Lanczos scaling are CPU-bound
        tokio::task::spawn_blocking(move || save_thumbnail(&bytes, size, &target))
            .await
            .map_err(|e| ThumbnailError::Join(e.to_string()))??;

        tracing::debug!("📸 Generated thumbnail: {}", path.display());
        Ok(path)
    }
}

/// Decode image bytes, scale to fit `size` and write a PNG
fn save_thumbnail(bytes: &[u8], size: u32, path: &Path) -> Result<(), ThumbnailError> {
    let img = image::load_from_memory(bytes)?;
    let thumbnail = img.resize(size, size, FilterType::Lanczos3);
    thumbnail.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::HealthBreakdown;
    use crate::test_support::spawn_backend;
    use axum::{http::header, routing::get, Router};
    use chrono::Utc;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;
    use std::time::Duration;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, _| Rgb([(x % 255) as u8, 120, 40]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn record(id: i64, url: &str) -> NdviRecord {
        NdviRecord {
            id,
            captured_at: Utc::now(),
            display_url: url.to_string(),
            original_url: url.to_string(),
            thumbnail_url: None,
            stats: None,
            health: HealthBreakdown::default(),
        }
    }

    #[test]
    fn test_save_thumbnail_fits_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.png");

        save_thumbnail(&png_bytes(800, 400), THUMBNAIL_SIZE, &path).unwrap();

        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (256, 128));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_thumbnail(b"not an image", 256, &dir.path().join("t.png")).unwrap_err();
        assert!(matches!(err, ThumbnailError::Decode(_)));
    }

    #[tokio::test]
    async fn test_get_downloads_once_then_hits_cache() {
        let router = Router::new().route(
            "/images/ndvi.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], png_bytes(512, 512)) }),
        );
        let base = spawn_backend(router).await;
        let api = ApiClient::new(&base, Duration::from_secs(5)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(api, dir.path().to_path_buf(), 64);

        let path = cache.get(3, &record(9, "/images/ndvi.png")).await.unwrap();
        assert_eq!(path, thumbnail_path(dir.path(), 3, 9));

        // The backend no longer serves the file; the cached copy is used.
        let offline = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let cache = ThumbnailCache::new(offline, dir.path().to_path_buf(), 64);
        assert_eq!(cache.get(3, &record(9, "/images/ndvi.png")).await.unwrap(), path);
    }

    #[tokio::test]
    async fn test_missing_image_is_fetch_error() {
        let base = spawn_backend(Router::new()).await;
        let api = ApiClient::new(&base, Duration::from_secs(5)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(api, dir.path().to_path_buf(), 64);

        let err = cache.get(1, &record(1, "/images/gone.png")).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Fetch(crate::error::FetchError::Status(404))));
    }
}
