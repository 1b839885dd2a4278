//! Recursive discovery of regular files
//!
//! The walk runs on its own thread and hands paths over a rendezvous channel,
//! so it only advances as fast as digesters take paths. Its final outcome is
//! reported separately once the path stream is closed.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender, bounded, select};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// A running directory walk
pub struct Walk {
    paths: Receiver<PathBuf>,
    outcome: Receiver<Result<()>>,
    handle: JoinHandle<()>,
}

impl Walk {
    /// Lazy stream of regular file paths. Clone it to share between consumers;
    /// it disconnects when the walk ends for any reason.
    pub fn paths(&self) -> &Receiver<PathBuf> {
        &self.paths
    }

    /// Wait for the walk to end and return its outcome
    pub fn finish(self) -> Result<()> {
        let Walk {
            paths,
            outcome,
            handle,
        } = self;
        // Unblock a walker still waiting to emit if nobody else is reading.
        drop(paths);

        let result = outcome.recv().unwrap_or(Err(Error::WalkCanceled));
        if handle.join().is_err() {
            return Err(Error::Io(std::io::Error::other("walker thread panicked")));
        }
        result
    }
}

/// Start walking `root`, emitting every regular file under it exactly once.
///
/// Directories, symlinks and special files are skipped. The first traversal
/// error aborts the walk and becomes its outcome; cancellation while a path
/// is pending emission ends it with [`Error::WalkCanceled`].
pub fn walk(root: &Path, cancel: CancelToken) -> Result<Walk> {
    let root = root.to_path_buf();
    spawn(cancel, move |paths, cancel| {
        let outcome = emit_files(&root, paths, cancel);
        debug!(?root, ok = outcome.is_ok(), "Walk finished");
        outcome
    })
}

/// Run `emit` on the walker thread. Whatever it returns becomes the walk
/// outcome, reported after the path stream has closed.
pub(crate) fn spawn<F>(cancel: CancelToken, emit: F) -> Result<Walk>
where
    F: FnOnce(&Sender<PathBuf>, &CancelToken) -> Result<()> + Send + 'static,
{
    let (paths_tx, paths_rx) = bounded::<PathBuf>(0);
    let (outcome_tx, outcome_rx) = bounded::<Result<()>>(1);

    let handle = thread::Builder::new()
        .name("walker".into())
        .spawn(move || {
            let outcome = emit(&paths_tx, &cancel);

            // Close the path stream before reporting.
            drop(paths_tx);
            // Buffered, never blocks.
            let _ = outcome_tx.send(outcome);
        })?;

    Ok(Walk {
        paths: paths_rx,
        outcome: outcome_rx,
        handle,
    })
}

fn emit_files(root: &Path, paths: &Sender<PathBuf>, cancel: &CancelToken) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            trace!(path = ?entry.path(), "Skipping non-regular entry");
            continue;
        }

        select! {
            send(paths, entry.into_path()) -> sent => {
                // All consumers gone: nothing left to feed.
                if sent.is_err() {
                    return Err(Error::WalkCanceled);
                }
            }
            recv(cancel.receiver()) -> _ => return Err(Error::WalkCanceled),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancellation;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top.jpg"), b"1").unwrap();
        fs::write(dir.path().join("a/mid.mov"), b"2").unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), b"3").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn test_emits_every_regular_file_once() {
        let dir = tree();
        let (_canceller, token) = cancellation();

        let running = walk(dir.path(), token).unwrap();
        let found: Vec<PathBuf> = running.paths().iter().collect();
        running.finish().unwrap();

        let unique: HashSet<_> = found.iter().cloned().collect();
        assert_eq!(found.len(), 3);
        assert_eq!(unique.len(), 3);
        assert!(unique.contains(&dir.path().join("a/b/deep.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_skips_symlinks() {
        let dir = tree();
        std::os::unix::fs::symlink(dir.path().join("top.jpg"), dir.path().join("link.jpg"))
            .unwrap();
        let (_canceller, token) = cancellation();

        let running = walk(dir.path(), token).unwrap();
        let found: Vec<PathBuf> = running.paths().iter().collect();
        running.finish().unwrap();

        assert_eq!(found.len(), 3);
        assert!(!found.contains(&dir.path().join("link.jpg")));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let (_canceller, token) = cancellation();

        let running = walk(&dir.path().join("nope"), token).unwrap();
        assert_eq!(running.paths().iter().count(), 0);
        assert!(matches!(running.finish(), Err(Error::WalkDir(_))));
    }

    #[test]
    fn test_cancel_stops_pending_emission() {
        let dir = tree();
        let (canceller, token) = cancellation();

        let running = walk(dir.path(), token).unwrap();
        let first = running.paths().recv().unwrap();
        assert!(first.starts_with(dir.path()));

        canceller.cancel();
        assert!(matches!(running.finish(), Err(Error::WalkCanceled)));
    }
}
