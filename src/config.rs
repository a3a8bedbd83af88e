/// Application configuration
///
/// Settings are resolved in priority order:
/// 1. Command-line flags
/// 2. Environment variables
/// 3. TOML config file (~/.config/field-monitor/config.toml on Linux)
/// 4. Compiled defaults
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::imagery::thumbnail::THUMBNAIL_SIZE;

/// Environment variable overriding the backend address
pub const API_URL_ENV: &str = "FIELD_MONITOR_API_URL";

/// How upload progress is produced
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Percentages derived from bytes actually written to the socket
    #[default]
    Real,
    /// Timer-driven percentages for backends that hide byte progress
    Simulated,
}

/// All tunable settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the NDVI processing backend
    pub api_base_url: String,

    /// Timeout for ordinary fetches (project lists, results, insights)
    pub request_timeout_secs: u64,

    /// Upper bound for the processing phase after an upload completes
    pub processing_timeout_secs: u64,

    /// Upload progress strategy
    pub progress_mode: ProgressMode,

    /// Accept `.jpg`/`.jpeg` alongside TIFF rasters
    pub accept_jpeg: bool,

    /// Edge length of generated thumbnails (square bound)
    pub thumbnail_size: u32,

    /// Trend chart raster size
    pub chart_width: u32,
    pub chart_height: u32,

    /// tracing filter directive, used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 30,
            processing_timeout_secs: 300,
            progress_mode: ProgressMode::Real,
            accept_jpeg: true,
            thumbnail_size: THUMBNAIL_SIZE,
            chart_width: 720,
            chart_height: 300,
            log_filter: "field_monitor=info".to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from the default location, or defaults when no file exists
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply the environment layer on top of the file layer
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
    }

    /// Check values after all layers are applied
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "api_base_url",
                reason: format!("expected an http(s) URL, got {:?}", self.api_base_url),
            });
        }
        if self.chart_width < 100 || self.chart_height < 100 {
            return Err(ConfigError::Invalid {
                field: "chart_width/chart_height",
                reason: "chart must be at least 100x100 pixels".to_string(),
            });
        }
        if self.thumbnail_size == 0 {
            return Err(ConfigError::Invalid {
                field: "thumbnail_size",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }
}

/// Get the path where the config file is expected
///
/// - Linux: ~/.config/field-monitor/config.toml
/// - macOS: ~/Library/Application Support/field-monitor/config.toml
/// - Windows: %APPDATA%\field-monitor\config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("field-monitor").join("config.toml"))
}
