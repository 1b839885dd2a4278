//! Sequential relocation of scanned files
//!
//! Files are moved one at a time so that two entries can never race for the
//! same collision-resolved destination. Every failure is logged and counted;
//! the batch always continues with the next file, and a file that could not
//! be moved stays at its source.

use crate::error::{Error, Result};
use crate::scan::ScanResult;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{Dispatch, debug, error, info, info_span, warn};

/// Highest collision suffix tried before giving up on a destination
const MAX_SUFFIX: u32 = 999;

/// Progress is reported every this many files
const PROGRESS_INTERVAL: usize = 10;

/// Copy buffer size for the cross-device fallback
const COPY_BUFFER: usize = 256 * 1024;

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Renamed to the destination
    Moved(PathBuf),
    /// Copied to the destination. The source is removed unless that failed,
    /// which is logged as a warning.
    Copied(PathBuf),
    /// Same-size file already at the destination; source removed
    Deduplicated(PathBuf),
    /// The source already is the file at its destination
    InPlace(PathBuf),
    /// No destination planned, or the entry was incomplete
    Skipped,
    /// Left at the source
    Failed(String),
}

/// Resolution of a proposed destination
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    /// Destination path is free
    Free(PathBuf),
    /// An existing file of the same size occupies the proposed path
    Duplicate,
    /// The source itself sits at the proposed path or a suffixed variant
    InPlace(PathBuf),
}

/// Counters for one batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MoveStats {
    pub total: usize,
    pub moved: usize,
    pub copied: usize,
    pub duplicates: usize,
    pub in_place: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl MoveStats {
    fn record(&mut self, outcome: &MoveOutcome) {
        match outcome {
            MoveOutcome::Moved(_) => self.moved += 1,
            MoveOutcome::Copied(_) => self.copied += 1,
            MoveOutcome::Deduplicated(_) => self.duplicates += 1,
            MoveOutcome::InPlace(_) => self.in_place += 1,
            MoveOutcome::Skipped => self.skipped += 1,
            MoveOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Moved: {}, Copied: {}, Duplicates: {}, In place: {}, Skipped: {}, Failed: {}",
            self.total,
            self.moved,
            self.copied,
            self.duplicates,
            self.in_place,
            self.skipped,
            self.failed
        )
    }
}

/// Moves files to their planned destinations
pub struct Mover {
    dispatch: Dispatch,
}

impl Mover {
    /// Create a mover whose per-file log lines go through `dispatch`
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Move every result that has a destination, in order
    pub fn move_all(&self, results: &[ScanResult]) -> MoveStats {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let total = results.len();
            let mut stats = MoveStats {
                total,
                ..MoveStats::default()
            };

            info!(total, "Processing files");

            for (count, result) in results.iter().enumerate() {
                if count % PROGRESS_INTERVAL == 0 {
                    info!("Progress: {}/{}", count, total);
                }

                let _span = info_span!("move", src_file = %result.source_path.display()).entered();
                let outcome = move_entry(result);
                stats.record(&outcome);
            }

            info!("{}", stats.summary());
            stats
        })
    }

    /// Move a single file from `source` to `destination`
    pub fn move_file(&self, source: &Path, destination: &Path) -> MoveOutcome {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let _span = info_span!("move", src_file = %source.display()).entered();
            move_file(source, destination)
        })
    }
}

fn move_entry(result: &ScanResult) -> MoveOutcome {
    match &result.dest_path {
        Some(dest) => move_file(&result.source_path, dest),
        None => {
            debug!("No destination planned, leaving in place");
            MoveOutcome::Skipped
        }
    }
}

fn move_file(source: &Path, destination: &Path) -> MoveOutcome {
    if source.as_os_str().is_empty() || destination.as_os_str().is_empty() {
        warn!("Skipped - Source or destination path missing");
        return MoveOutcome::Skipped;
    }

    if let Some(parent) = destination.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        // Not fatal here; the rename or copy below reports the real failure.
        error!(dir = %parent.display(), error = %e, "Error when creating directory");
    }

    let destination = match resolve_destination(source, destination) {
        Ok(Resolution::Free(path)) => path,
        Ok(Resolution::Duplicate) => {
            info!(dest = %destination.display(), "Same size - same file, removing source");
            if let Err(e) = fs::remove_file(source) {
                error!(error = %e, "Failed removing original file");
                return MoveOutcome::Failed(e.to_string());
            }
            return MoveOutcome::Deduplicated(destination.to_path_buf());
        }
        Ok(Resolution::InPlace(path)) => {
            info!(dest = %path.display(), "Already in place");
            return MoveOutcome::InPlace(path);
        }
        Err(e) => {
            error!(error = %e, "Failed to resolve destination");
            return MoveOutcome::Failed(e.to_string());
        }
    };

    match fs::rename(source, &destination) {
        Ok(()) => {
            info!(dest = %destination.display(), "Moved");
            MoveOutcome::Moved(destination)
        }
        Err(e) => {
            info!(error = %e, "Rename not possible, copying");
            match copy_and_remove(source, &destination) {
                Ok(()) => {
                    info!(dest = %destination.display(), "Copied");
                    MoveOutcome::Copied(destination)
                }
                Err(e) => MoveOutcome::Failed(e.to_string()),
            }
        }
    }
}

/// Pick the final destination for `source`.
///
/// A free proposed path is used as is. An occupied one holding a file of the
/// same size counts as a duplicate; otherwise `_001`, `_002`, ... is inserted
/// before the extension until a free path is found. A source that already is
/// one of these files stays where it is.
fn resolve_destination(source: &Path, proposed: &Path) -> Result<Resolution> {
    let existing = match fs::metadata(proposed) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Resolution::Free(proposed.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    if is_same_file(source, proposed) {
        return Ok(Resolution::InPlace(proposed.to_path_buf()));
    }

    info!(dest = %proposed.display(), "File with same name already exists");
    let source_len = fs::metadata(source)?.len();
    if source_len == existing.len() {
        return Ok(Resolution::Duplicate);
    }

    for n in 1..=MAX_SUFFIX {
        let candidate = with_suffix(proposed, n)?;
        if !candidate.try_exists()? {
            debug!(dest = %candidate.display(), "Resolved name collision");
            return Ok(Resolution::Free(candidate));
        }
        if is_same_file(source, &candidate) {
            return Ok(Resolution::InPlace(candidate));
        }
    }

    Err(Error::InvalidPath {
        path: proposed.to_path_buf(),
        message: format!("no free name up to suffix _{MAX_SUFFIX:03}"),
    })
}

/// Both paths resolve to the same file on disk
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `dir/name.ext` -> `dir/name_NNN.ext`
fn with_suffix(path: &Path, n: u32) -> Result<PathBuf> {
    let stem = path.file_stem().ok_or_else(|| Error::InvalidPath {
        path: path.to_path_buf(),
        message: "missing file name".into(),
    })?;

    let mut name = stem.to_os_string();
    name.push(format!("_{n:03}"));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    Ok(path.with_file_name(name))
}

/// Stream-copy `source` to `destination`, then delete `source`.
///
/// The copy is synced before the source is removed. A failed copy leaves the
/// source untouched; once the copy is complete, failing to remove the source
/// only warns, the file having reached its destination.
fn copy_and_remove(source: &Path, destination: &Path) -> Result<()> {
    copy_file(source, destination)?;
    preserve_mtime(source, destination);

    if let Err(e) = fs::remove_file(source) {
        warn!(error = %e, "Copied, but failed removing source file");
    }
    Ok(())
}

/// Carry the modification time of `source` over to its copy
fn preserve_mtime(source: &Path, destination: &Path) {
    let mtime = match fs::metadata(source).and_then(|m| m.modified()) {
        Ok(mtime) => filetime::FileTime::from_system_time(mtime),
        Err(e) => {
            warn!(error = %e, "Couldn't read source modification time");
            return;
        }
    };
    if let Err(e) = filetime::set_file_mtime(destination, mtime) {
        warn!(error = %e, "Couldn't set modification time on copy");
    }
}

/// Copy into a newly created `destination`, removing it again if writing fails
fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let src_file = File::open(source).inspect_err(|e| {
        error!(error = %e, "Couldn't open source file");
    })?;
    let dest_file = File::create_new(destination).inspect_err(|e| {
        error!(error = %e, "Couldn't open dest file");
    })?;

    if let Err(e) = write_copy(src_file, dest_file) {
        error!(error = %e, "Writing to output file failed");
        if let Err(cleanup) = fs::remove_file(destination) {
            warn!(error = %cleanup, "Failed removing incomplete copy");
        }
        return Err(e);
    }
    Ok(())
}

fn write_copy(source: File, destination: File) -> Result<()> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER, source);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER, destination);
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    let destination = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    destination.sync_all()?;
    Ok(())
}
