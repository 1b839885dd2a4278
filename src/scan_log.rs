//! JSON scan log
//!
//! Each run appends one JSON array of [`ScanResult`] records to the log file.

use crate::error::Result;
use crate::scan::ScanResult;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Default scan log file name
pub const SCAN_LOG: &str = "scan.json";

/// Append `results` to the scan log at `path` as one JSON array
pub fn write_scan_log(path: &Path, results: &[ScanResult]) -> Result<()> {
    let json = serde_json::to_vec(results)?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&json)?;
    file.flush()?;

    debug!(path = %path.display(), records = results.len(), "Wrote scan log");
    Ok(())
}

/// Read a scan log holding a single run
pub fn read_scan_log(path: &Path) -> Result<Vec<ScanResult>> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
