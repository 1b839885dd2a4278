//! CLI argument parsing with clap

use crate::config::Config;
use crate::scan_log::SCAN_LOG;
use clap::Parser;
use std::path::PathBuf;

/// Default move log file name
pub const MOVE_LOG: &str = "move.log";

/// Media Sorter - moves photos and videos into dated folders
///
/// Every photo (.jpg) and video (.mov, .mp4, .avi) under SOURCE is moved to
/// DEST/<photo|video folder>/<year-month>/<timestamp>.<ext>, dated by its
/// EXIF capture date or, failing that, its modification time. Other files
/// are left where they are.
#[derive(Parser, Debug)]
#[command(name = "media-sorter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan for media files
    pub source: PathBuf,

    /// Root of the organized destination tree
    pub dest: PathBuf,

    /// Path to configuration file (TOML format)
    ///
    /// CLI arguments override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent digesters
    #[arg(short = 't', long, env = "MEDIA_SORTER_WORKERS")]
    pub workers: Option<usize>,

    /// File the JSON scan results are appended to
    #[arg(long, default_value = SCAN_LOG)]
    pub scan_log: PathBuf,

    /// File the move log is appended to
    #[arg(long, default_value = MOVE_LOG)]
    pub move_log: PathBuf,

    /// Scan and write the scan log, but move nothing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,
}

impl Cli {
    /// Apply CLI overrides on top of `config`
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config
    }
}
