/// File intake: validation and staging of user-selected rasters
///
/// Candidates come from the native picker or from files dropped on the
/// window. Only accepted extensions are staged, in arrival order. The
/// queue is purely in-memory; nothing here touches the network.
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ValidationError;

/// Classification of a file by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionClass {
    RasterTiff,
    RasterJpeg,
    Rejected,
}

impl ExtensionClass {
    /// MIME type sent with the multipart field
    pub fn mime(&self) -> &'static str {
        match self {
            ExtensionClass::RasterTiff => "image/tiff",
            ExtensionClass::RasterJpeg => "image/jpeg",
            ExtensionClass::Rejected => "application/octet-stream",
        }
    }
}

/// Which extensions the intake accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptPolicy {
    /// `.tif` / `.tiff` only
    RasterOnly,
    /// Rasters plus `.jpg` / `.jpeg` photos
    RasterAndJpeg,
}

impl AcceptPolicy {
    pub fn from_config(accept_jpeg: bool) -> Self {
        if accept_jpeg {
            AcceptPolicy::RasterAndJpeg
        } else {
            AcceptPolicy::RasterOnly
        }
    }

    /// Classify a file name; the match is case-insensitive
    pub fn classify(&self, name: &str) -> ExtensionClass {
        let lower = name.to_lowercase();
        if lower.ends_with(".tif") || lower.ends_with(".tiff") {
            ExtensionClass::RasterTiff
        } else if *self == AcceptPolicy::RasterAndJpeg
            && (lower.ends_with(".jpg") || lower.ends_with(".jpeg"))
        {
            ExtensionClass::RasterJpeg
        } else {
            ExtensionClass::Rejected
        }
    }

    /// Human-readable list for error messages
    pub fn describe(&self) -> &'static str {
        match self {
            AcceptPolicy::RasterOnly => ".tif, .tiff",
            AcceptPolicy::RasterAndJpeg => ".tif, .tiff, .jpg, .jpeg",
        }
    }

    /// Extensions for the native file dialog filter
    pub fn dialog_extensions(&self) -> &'static [&'static str] {
        match self {
            AcceptPolicy::RasterOnly => &["tif", "tiff", "TIF", "TIFF"],
            AcceptPolicy::RasterAndJpeg => {
                &["tif", "tiff", "jpg", "jpeg", "TIF", "TIFF", "JPG", "JPEG"]
            }
        }
    }
}

/// A file offered to the intake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub name: String,
    pub byte_size: u64,
}

impl Candidate {
    /// Build a candidate from a file on disk
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            byte_size: metadata.len(),
        })
    }

    /// Expand a dropped path: files as-is, directories walked recursively
    pub fn collect(path: &Path) -> Vec<Self> {
        if path.is_dir() {
            WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| Self::from_path(e.path()).ok())
                .collect()
        } else {
            match Self::from_path(path) {
                Ok(candidate) => vec![candidate],
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        }
    }
}

/// One accepted file waiting for transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub name: String,
    pub byte_size: u64,
    pub extension_class: ExtensionClass,
}

impl StagedFile {
    /// Size for display, e.g. "12.34 MB"
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.byte_size as f64 / 1024.0 / 1024.0)
    }
}

/// Ordered queue of staged files
#[derive(Debug, Clone)]
pub struct FileIntake {
    policy: AcceptPolicy,
    queue: Vec<StagedFile>,
    error: Option<ValidationError>,
}

impl FileIntake {
    pub fn new(policy: AcceptPolicy) -> Self {
        Self {
            policy,
            queue: Vec::new(),
            error: None,
        }
    }

    pub fn policy(&self) -> AcceptPolicy {
        self.policy
    }

    /// Stage every accepted candidate, keeping arrival order
    ///
    /// Rejections never discard files that are already queued. A batch with
    /// rejections sets the intake error; a clean batch clears it. Returns the
    /// number of files staged from this batch.
    pub fn stage(&mut self, candidates: Vec<Candidate>) -> usize {
        let mut accepted = 0;
        let mut rejected = Vec::new();

        for candidate in candidates {
            match self.policy.classify(&candidate.name) {
                ExtensionClass::Rejected => rejected.push(candidate.name),
                extension_class => {
                    self.queue.push(StagedFile {
                        path: candidate.path,
                        name: candidate.name,
                        byte_size: candidate.byte_size,
                        extension_class,
                    });
                    accepted += 1;
                }
            }
        }

        if rejected.is_empty() {
            self.error = None;
        } else {
            tracing::info!("Rejected {} unsupported file(s): {:?}", rejected.len(), rejected);
            self.error = Some(ValidationError::UnsupportedFormat {
                accepted: self.policy.describe().to_string(),
                rejected,
            });
        }

        accepted
    }

    /// Remove one file; the remaining order is unchanged
    pub fn remove(&mut self, index: usize) -> Option<StagedFile> {
        if index < self.queue.len() {
            Some(self.queue.remove(index))
        } else {
            None
        }
    }

    /// Drop every staged file and the pending error
    pub fn clear(&mut self) {
        self.queue.clear();
        self.error = None;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.queue.iter().map(|f| f.byte_size).sum()
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, size: u64) -> Candidate {
        Candidate {
            path: PathBuf::from(format!("/fields/{name}")),
            name: name.to_string(),
            byte_size: size,
        }
    }

    #[test]
    fn test_only_accepted_extensions_are_staged_in_order() {
        let mut intake = FileIntake::new(AcceptPolicy::RasterOnly);
        let staged = intake.stage(vec![
            candidate("north.tif", 10),
            candidate("notes.txt", 1),
            candidate("south.TIFF", 20),
            candidate("drone.jpg", 5),
            candidate("east.tiff", 30),
        ]);

        assert_eq!(staged, 3);
        let names: Vec<_> = intake.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["north.tif", "south.TIFF", "east.tiff"]);
        assert_eq!(intake.total_bytes(), 60);
    }

    #[test]
    fn test_rejection_keeps_existing_queue_and_sets_one_error() {
        let mut intake = FileIntake::new(AcceptPolicy::RasterOnly);
        intake.stage(vec![candidate("a.tif", 1)]);
        assert!(intake.error().is_none());

        intake.stage(vec![candidate("b.png", 1), candidate("c.pdf", 1)]);
        assert_eq!(intake.len(), 1);
        match intake.error() {
            Some(ValidationError::UnsupportedFormat { rejected, .. }) => {
                assert_eq!(rejected, &vec!["b.png".to_string(), "c.pdf".to_string()]);
            }
            other => panic!("unexpected error state: {other:?}"),
        }

        intake.stage(vec![candidate("d.tif", 1)]);
        assert!(intake.error().is_none());
        assert_eq!(intake.len(), 2);
    }

    #[test]
    fn test_jpeg_policy() {
        let mut intake = FileIntake::new(AcceptPolicy::RasterAndJpeg);
        intake.stage(vec![candidate("drone.JPG", 1), candidate("scan.jpeg", 1)]);

        assert_eq!(intake.len(), 2);
        assert!(intake
            .files()
            .iter()
            .all(|f| f.extension_class == ExtensionClass::RasterJpeg));
    }

    #[test]
    fn test_remove_preserves_order_and_ignores_out_of_range() {
        let mut intake = FileIntake::new(AcceptPolicy::RasterOnly);
        intake.stage(vec![candidate("1.tif", 1), candidate("2.tif", 1), candidate("3.tif", 1)]);

        assert_eq!(intake.remove(1).map(|f| f.name), Some("2.tif".to_string()));
        assert_eq!(intake.remove(5), None);
        let names: Vec<_> = intake.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["1.tif", "3.tif"]);
    }

    #[test]
    fn test_size_label() {
        let file = StagedFile {
            path: PathBuf::from("x.tif"),
            name: "x.tif".to_string(),
            byte_size: 5 * 1024 * 1024 + 512 * 1024,
            extension_class: ExtensionClass::RasterTiff,
        };
        assert_eq!(file.size_label(), "5.50 MB");
    }

    #[test]
    fn test_collect_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tif"), b"II*\0").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("b.tif"), b"II*\0data").unwrap();

        let candidates = Candidate::collect(dir.path());
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().any(|c| c.name == "b.tif" && c.byte_size == 8));
    }
}
