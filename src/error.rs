//! Error types for the media sorter

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data: {message}")]
    ExifRead { message: String },

    #[error("Invalid path {path}: {message}")]
    InvalidPath { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Walk canceled")]
    WalkCanceled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to start digester pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}
