//! Media Sorter - moves photos and videos into dated folders
//!
//! This library provides:
//! - A cancellable recursive walk feeding a fixed pool of digesters
//! - EXIF capture dates for photos with a modification time fallback
//! - MD5 fingerprints recorded in a JSON scan log
//! - Sequential moves with size-based duplicate detection and `_NNN`
//!   collision suffixes

pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod media;
pub mod mover;
pub mod scan;
pub mod scan_log;
pub mod time;
pub mod walk;

pub use cli::Cli;
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use media::{MediaKind, classify};
pub use mover::{MoveOutcome, MoveStats, Mover};
pub use scan::{Digester, ScanResult, scan_dir};
pub use scan_log::{read_scan_log, write_scan_log};
