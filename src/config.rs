//! Configuration for the media sorter

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Default folder pattern: one folder per year and month
pub const DEFAULT_FOLDER_PATTERN: &str = "%Y-%m";
/// Default file name pattern: full timestamp to the second
pub const DEFAULT_FILE_PATTERN: &str = "%Y%m%d_%H%M%S";
pub const DEFAULT_PHOTO_FOLDER: &str = "fotos";
pub const DEFAULT_VIDEO_FOLDER: &str = "videos";
/// Default size of the digester pool
pub const DEFAULT_WORKERS: usize = 20;

/// Configuration consumed read-only by the digesters and the mover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// strftime pattern for the date folder (e.g. `2024-05`)
    pub folder_pattern: String,

    /// strftime pattern for the file name, without extension
    pub file_pattern: String,

    /// Subfolder of the destination root receiving photos
    pub photo_folder: String,

    /// Subfolder of the destination root receiving videos
    pub video_folder: String,

    /// Number of concurrent digesters
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folder_pattern: DEFAULT_FOLDER_PATTERN.into(),
            file_pattern: DEFAULT_FILE_PATTERN.into(),
            photo_folder: DEFAULT_PHOTO_FOLDER.into(),
            video_folder: DEFAULT_VIDEO_FOLDER.into(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Config {
    /// Number of digesters to start, never zero
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Reject values that would produce unusable destination paths
    pub fn validate(&self) -> crate::Result<()> {
        for (name, value) in [
            ("photo_folder", &self.photo_folder),
            ("video_folder", &self.video_folder),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::Config(format!("{name} must not be empty")));
            }
        }

        // Render a fixed sample date to catch patterns that collapse to nothing
        // or escape their folder.
        let sample = chrono::NaiveDate::from_ymd_opt(2001, 2, 3)
            .and_then(|d| d.and_hms_opt(4, 5, 6))
            .ok_or_else(|| crate::Error::Config("invalid sample date".into()))?;

        for (name, pattern) in [
            ("folder_pattern", &self.folder_pattern),
            ("file_pattern", &self.file_pattern),
        ] {
            let items = chrono::format::StrftimeItems::new(pattern);
            if items.clone().any(|item| matches!(item, chrono::format::Item::Error)) {
                return Err(crate::Error::Config(format!(
                    "{name} '{pattern}' is not a valid strftime pattern"
                )));
            }
            // Offset specifiers such as `%z` parse but cannot be rendered
            // from a naive date; the formatter reports that as an error.
            let mut rendered = String::new();
            write!(rendered, "{}", sample.format_with_items(items)).map_err(|_| {
                crate::Error::Config(format!(
                    "{name} '{pattern}' cannot be rendered from a local date"
                ))
            })?;
            if rendered.is_empty() || rendered.contains(['/', '\\']) {
                return Err(crate::Error::Config(format!(
                    "{name} '{pattern}' must render to a single non-empty path component"
                )));
            }
        }

        Ok(())
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}
