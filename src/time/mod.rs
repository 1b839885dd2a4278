//! Capture date extraction
//!
//! Photos are dated from their EXIF metadata when it is present and valid.
//! Everything else, and photos whose metadata cannot be used, fall back to
//! the file system modification time.

pub mod exif;

use crate::error::Result;
use crate::media::MediaKind;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Source of the extracted timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Embedded EXIF capture date
    Metadata,
    /// File system modification time
    FileSystem,
}

impl TimeSource {
    pub fn label(&self) -> &'static str {
        match self {
            TimeSource::Metadata => "metadata",
            TimeSource::FileSystem => "filesystem",
        }
    }
}

/// Result of timestamp extraction
#[derive(Debug, Clone)]
pub struct ExtractedTime {
    /// Capture date in the local, unspecified timezone
    pub timestamp: NaiveDateTime,
    /// Source of the timestamp
    pub source: TimeSource,
    /// Why metadata could not be used, when it was attempted and failed
    pub metadata_error: Option<String>,
}

/// Determine the capture date of a file.
///
/// `data` is the file content for photos that were read; metadata parsing is
/// only attempted for photos with content available. The only hard failure is
/// a file whose modification time cannot be read.
pub fn extract_date(path: &Path, kind: MediaKind, data: Option<&[u8]>) -> Result<ExtractedTime> {
    let metadata_error = match (kind, data) {
        (MediaKind::Photo, Some(data)) => match exif::extract_exif_time(data) {
            Ok(timestamp) => {
                debug!(?path, "Extracted time from EXIF");
                return Ok(ExtractedTime {
                    timestamp,
                    source: TimeSource::Metadata,
                    metadata_error: None,
                });
            }
            Err(e) => {
                debug!(?path, error = %e, "No usable EXIF time, using file system time");
                Some(e.to_string())
            }
        },
        _ => None,
    };

    Ok(ExtractedTime {
        timestamp: modified_time(path)?,
        source: TimeSource::FileSystem,
        metadata_error,
    })
}

/// Last modification time of a file, in local time
pub fn modified_time(path: &Path) -> Result<NaiveDateTime> {
    let modified = fs::metadata(path)?.modified()?;
    let local: DateTime<Local> = modified.into();
    Ok(local.naive_local())
}
