//! Error types for the dashboard
//!
//! One enum per failure family. Every error is caught at the component
//! boundary and turned into a single message for the user; none of them
//! should leave the upload session or the timeline in a half-updated state.

use thiserror::Error;

/// A staged file was rejected by the intake filter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more candidates had an extension outside the accepted set
    #[error("Only supported formats are accepted: {accepted}")]
    UnsupportedFormat {
        accepted: String,
        rejected: Vec<String>,
    },
}

/// The upload itself failed before the server received every byte
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Network error during upload: {0}")]
    Network(String),

    #[error("Upload rejected with status {0}")]
    Status(u16),

    #[error("Could not read {name}: {reason}")]
    FileRead { name: String, reason: String },

    #[error("Nothing to upload")]
    EmptyQueue,
}

/// The upload succeeded but the remote computation did not
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("Processing failed with status {0}")]
    Status(u16),

    #[error("Processing response was malformed: {0}")]
    Malformed(String),

    #[error("Connection lost while processing: {0}")]
    Interrupted(String),

    #[error("Processing timed out after {0}s")]
    TimedOut(u64),
}

/// A result list, project or insight request did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Configuration file could not be read or parsed
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Thumbnail download or decode failed
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    Join(String),
}

/// Anything that can end an upload session in `failed`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl UploadError {
    /// Message shown under the upload area
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Transfer(TransferError::EmptyQueue) => {
                "Select at least one file to upload.".to_string()
            }
            UploadError::Transfer(err) => format!("Upload failed. Please try again. ({err})"),
            UploadError::Processing(err) => {
                format!("NDVI processing failed. Please try again. ({err})")
            }
        }
    }
}

impl FetchError {
    /// Message shown next to a stale-but-consistent view
    pub fn user_message(&self) -> String {
        format!("Could not refresh results: {self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_formats() {
        let err = ValidationError::UnsupportedFormat {
            accepted: ".tif, .tiff".to_string(),
            rejected: vec!["notes.txt".to_string()],
        };
        assert_eq!(err.to_string(), "Only supported formats are accepted: .tif, .tiff");
    }

    #[test]
    fn test_upload_error_messages_are_distinct() {
        let transfer = UploadError::from(TransferError::Status(502));
        let processing = UploadError::from(ProcessingError::TimedOut(300));

        assert!(transfer.user_message().starts_with("Upload failed"));
        assert!(processing.user_message().starts_with("NDVI processing failed"));
        assert!(processing.user_message().contains("300s"));
    }
}
