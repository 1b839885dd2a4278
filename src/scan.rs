//! Concurrent scan of a source tree
//!
//! A walker thread feeds paths to a fixed pool of digesters; each digester
//! classifies, fingerprints and dates one file at a time and publishes a
//! [`ScanResult`]. The caller's thread aggregates results in arrival order.
//! Both hand-offs are rendezvous channels, so a slow consumer throttles the
//! producers instead of letting results pile up.

use crate::cancel::{CancelToken, Canceller, cancellation};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hash::fingerprint;
use crate::media::{MediaKind, classify};
use crate::time::extract_date;
use crate::walk;
use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender, bounded, select};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Dispatch, debug, info, info_span, warn};

/// Error recorded for files that are neither photo nor video
pub const NOT_MEDIA: &str = "Not a photo or video";

/// Outcome of scanning one file. This is also the scan log record; the JSON
/// field names are part of the log format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Absolute source path
    #[serde(rename = "SourcePath")]
    pub source_path: PathBuf,
    /// Planned destination; `None` means the file is not moved
    #[serde(rename = "DestPath", with = "empty_as_none")]
    pub dest_path: Option<PathBuf>,
    /// MD5 of the content, photos only
    #[serde(rename = "Md5", with = "empty_as_none")]
    pub fingerprint: Option<String>,
    /// Free-text classification outcome
    #[serde(rename = "Status")]
    pub status: String,
    /// Recoverable problem met while scanning this file
    #[serde(rename = "Err", with = "empty_as_none")]
    pub error: Option<String>,
}

/// Serialize `None` as an empty string and read an empty string back as `None`
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: From<String>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok((!raw.is_empty()).then(|| T::from(raw)))
    }
}

/// Plans the destination of single files
#[derive(Clone)]
pub struct Digester {
    config: Arc<Config>,
    dest_root: PathBuf,
    dispatch: Dispatch,
}

impl Digester {
    /// Create a digester writing into `dest_root`, logging through `dispatch`
    pub fn new(config: Arc<Config>, dest_root: &Path, dispatch: Dispatch) -> Self {
        let dest_root =
            tracing::dispatcher::with_default(&dispatch, || absolute_or_given(dest_root));
        Self {
            config,
            dest_root,
            dispatch,
        }
    }

    /// Scan one file. Never fails: problems end up in [`ScanResult::error`].
    pub fn digest(&self, path: &Path) -> ScanResult {
        let source_path = absolute_or_given(path);
        let kind = classify(path);

        if kind == MediaKind::Other {
            debug!(?path, "Not a photo or video, leaving in place");
            return ScanResult {
                source_path,
                dest_path: None,
                fingerprint: None,
                status: "skipped".into(),
                error: Some(NOT_MEDIA.into()),
            };
        }

        let mut errors = Vec::new();

        let data = if kind == MediaKind::Photo {
            match fs::read(path) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(?path, error = %e, "Failed to read photo content");
                    errors.push(format!("Failed to read content: {e}"));
                    None
                }
            }
        } else {
            None
        };

        let fingerprint = data.as_deref().map(fingerprint);

        let time = match extract_date(path, kind, data.as_deref()) {
            Ok(time) => time,
            Err(e) => {
                warn!(?path, error = %e, "Failed to determine capture date");
                errors.push(e.to_string());
                return ScanResult {
                    source_path,
                    dest_path: None,
                    fingerprint,
                    status: "failed".into(),
                    error: Some(errors.join("; ")),
                };
            }
        };
        errors.extend(time.metadata_error.clone());

        let dest_path = match self.destination(kind, &time.timestamp, path) {
            Ok(dest) => Some(dest),
            Err(e) => {
                warn!(?path, error = %e, "Failed to build destination path");
                errors.push(e.to_string());
                None
            }
        };

        debug!(?path, ?dest_path, source = time.source.label(), "Digested file");

        ScanResult {
            source_path,
            dest_path,
            fingerprint,
            status: time.source.label().into(),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    /// `dest_root/<kind folder>/<date folder>/<date file name><original extension>`
    fn destination(
        &self,
        kind: MediaKind,
        timestamp: &NaiveDateTime,
        source: &Path,
    ) -> Result<PathBuf> {
        let kind_folder = kind
            .folder_name(&self.config)
            .ok_or_else(|| Error::InvalidPath {
                path: source.to_path_buf(),
                message: "no destination folder for this kind".into(),
            })?;

        let date_folder = render(timestamp, &self.config.folder_pattern)?;
        let mut file_name = render(timestamp, &self.config.file_pattern)?;
        if let Some(ext) = source.extension() {
            file_name.push('.');
            file_name.push_str(&ext.to_string_lossy());
        }

        Ok(self
            .dest_root
            .join(kind_folder)
            .join(date_folder)
            .join(file_name))
    }

    /// Consume paths until the stream closes or cancellation fires
    fn run(&self, paths: &Receiver<PathBuf>, results: &Sender<ScanResult>, cancel: &CancelToken) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            loop {
                let path = select! {
                    recv(paths) -> path => match path {
                        Ok(path) => path,
                        Err(_) => return,
                    },
                    recv(cancel.receiver()) -> _ => return,
                };

                let result = self.digest(&path);

                select! {
                    send(results, result) -> sent => {
                        if sent.is_err() {
                            return;
                        }
                    }
                    recv(cancel.receiver()) -> _ => return,
                }
            }
        })
    }
}

/// Format a timestamp without panicking on a bad pattern
fn render(timestamp: &NaiveDateTime, pattern: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", timestamp.format(pattern))
        .map_err(|_| Error::Config(format!("invalid date pattern '{pattern}'")))?;
    Ok(out)
}

fn absolute_or_given(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|e| {
        warn!(?path, error = %e, "Failed to resolve absolute path");
        path.to_path_buf()
    })
}

/// Scan every regular file under `root` and plan its move into `dest_root`.
///
/// Returns one result per file in arrival order. A failed walk discards the
/// collected results and returns the walk error instead; per-file problems
/// never abort the scan.
pub fn scan_dir(
    root: &Path,
    dest_root: &Path,
    config: &Config,
    dispatch: Dispatch,
) -> Result<Vec<ScanResult>> {
    tracing::dispatcher::with_default(&dispatch.clone(), || -> Result<Vec<ScanResult>> {
        let _span = info_span!("scan", ?root).entered();

        let (canceller, cancel) = cancellation();
        let walker = walk::walk(root, cancel.clone())?;
        scan_paths(walker, canceller, cancel, dest_root, config, dispatch)
    })
}

/// Digest every path `walker` emits and aggregate the results.
///
/// `canceller` is fired before returning, whatever the outcome.
fn scan_paths(
    walker: walk::Walk,
    canceller: Canceller,
    cancel: CancelToken,
    dest_root: &Path,
    config: &Config,
    dispatch: Dispatch,
) -> Result<Vec<ScanResult>> {
    let workers = config.worker_count();
    let digester = Digester::new(Arc::new(config.clone()), dest_root, dispatch);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("digester-{i}"))
        .build()?;

    let (results_tx, results_rx) = bounded::<ScanResult>(0);
    for _ in 0..workers {
        let digester = digester.clone();
        let paths = walker.paths().clone();
        let results = results_tx.clone();
        let cancel = cancel.clone();
        pool.spawn(move || digester.run(&paths, &results, &cancel));
    }
    // The result stream closes once every digester has returned.
    drop(results_tx);

    let collected: Vec<ScanResult> = results_rx.iter().collect();

    let outcome = walker.finish();
    canceller.cancel();
    if let Err(e) = outcome {
        warn!(discarded = collected.len(), error = %e, "Walk failed, discarding results");
        return Err(e);
    }

    info!(files = collected.len(), workers, "Scan complete");
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::exif::tests::jpeg_with_datetime;
    use chrono::{DateTime, Local};
    use filetime::FileTime;
    use std::collections::HashSet;
    use tempfile::TempDir;

    const MTIME: i64 = 1_600_000_000;

    fn digester(dest: &Path) -> Digester {
        Digester::new(Arc::new(Config::default()), dest, Dispatch::default())
    }

    fn write_file(path: &Path, content: &[u8]) {
        fs::write(path, content).unwrap();
        filetime::set_file_mtime(path, FileTime::from_unix_time(MTIME, 0)).unwrap();
    }

    fn mtime_parts() -> (String, String) {
        let local = DateTime::from_timestamp(MTIME, 0).unwrap().with_timezone(&Local);
        (
            local.format("%Y-%m").to_string(),
            local.format("%Y%m%d_%H%M%S").to_string(),
        )
    }

    #[test]
    fn test_digest_photo_with_exif() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("IMG_1.jpg");
        let data = jpeg_with_datetime("2019:07:04 12:34:56");
        write_file(&src, &data);

        let result = digester(&dir.path().join("out")).digest(&src);
        assert_eq!(
            result.dest_path,
            Some(dir.path().join("out/fotos/2019-07/20190704_123456.jpg"))
        );
        assert_eq!(result.fingerprint, Some(crate::hash::fingerprint(&data)));
        assert_eq!(result.status, "metadata");
        assert_eq!(result.error, None);
        assert!(result.source_path.is_absolute());
    }

    #[test]
    fn test_digest_photo_without_exif_falls_back() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("broken.JPG");
        write_file(&src, b"garbage");

        let result = digester(&dir.path().join("out")).digest(&src);
        let (folder, stem) = mtime_parts();
        assert_eq!(
            result.dest_path,
            Some(dir.path().join("out/fotos").join(folder).join(format!("{stem}.JPG")))
        );
        assert_eq!(result.status, "filesystem");
        assert!(result.fingerprint.is_some());
        // The failed metadata attempt is recorded but does not block the move
        assert!(result.error.is_some());
    }

    #[test]
    fn test_digest_video() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("clip.mp4");
        write_file(&src, b"video bytes");

        let result = digester(&dir.path().join("out")).digest(&src);
        let (folder, stem) = mtime_parts();
        assert_eq!(
            result.dest_path,
            Some(dir.path().join("out/videos").join(folder).join(format!("{stem}.mp4")))
        );
        assert_eq!(result.fingerprint, None);
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_digest_other_is_not_planned() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("notes.txt");
        write_file(&src, b"text");

        let result = digester(&dir.path().join("out")).digest(&src);
        assert_eq!(result.dest_path, None);
        assert_eq!(result.fingerprint, None);
        assert_eq!(result.error.as_deref(), Some(NOT_MEDIA));
    }

    #[test]
    fn test_digest_uses_configured_names() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("clip.mov");
        write_file(&src, b"video bytes");

        let config = Config {
            folder_pattern: "%Y".into(),
            file_pattern: "%H%M".into(),
            video_folder: "Movies".into(),
            ..Config::default()
        };
        let digester = Digester::new(Arc::new(config), &dir.path().join("out"), Dispatch::default());
        let result = digester.digest(&src);

        let local = DateTime::from_timestamp(MTIME, 0).unwrap().with_timezone(&Local);
        let expected = dir
            .path()
            .join("out/Movies")
            .join(local.format("%Y").to_string())
            .join(format!("{}.mov", local.format("%H%M")));
        assert_eq!(result.dest_path, Some(expected));
    }

    #[test]
    fn test_bad_pattern_is_a_soft_error() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("clip.avi");
        write_file(&src, b"video bytes");

        let config = Config {
            file_pattern: "%Q".into(),
            ..Config::default()
        };
        let digester = Digester::new(Arc::new(config), &dir.path().join("out"), Dispatch::default());
        let result = digester.digest(&src);
        assert_eq!(result.dest_path, None);
        assert!(result.error.unwrap().contains("invalid date pattern"));
    }

    #[test]
    fn test_scan_result_json_keys() {
        let result = ScanResult {
            source_path: PathBuf::from("/src/a.txt"),
            dest_path: None,
            fingerprint: None,
            status: "skipped".into(),
            error: Some(NOT_MEDIA.into()),
        };

        let json = serde_json::to_value(&result).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["DestPath", "Err", "Md5", "SourcePath", "Status"]);
        assert_eq!(json["SourcePath"], "/src/a.txt");
        assert_eq!(json["DestPath"], "");
        assert_eq!(json["Md5"], "");
        assert_eq!(json["Status"], "skipped");
        assert_eq!(json["Err"], NOT_MEDIA);

        let back: ScanResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_scan_dir_covers_every_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        for i in 0..60 {
            let sub = src.join(format!("d{}", i % 7));
            fs::create_dir_all(&sub).unwrap();
            let ext = ["jpg", "mov", "txt"][i % 3];
            write_file(&sub.join(format!("f{i}.{ext}")), format!("{i}").as_bytes());
        }

        let config = Config {
            workers: 4,
            ..Config::default()
        };
        let results = scan_dir(&src, &dir.path().join("out"), &config, Dispatch::default()).unwrap();

        assert_eq!(results.len(), 60);
        let sources: HashSet<_> = results.iter().map(|r| r.source_path.clone()).collect();
        assert_eq!(sources.len(), 60);
        assert_eq!(results.iter().filter(|r| r.dest_path.is_none()).count(), 20);
    }

    #[test]
    fn test_scan_dir_empty_tree() {
        let dir = TempDir::new().unwrap();
        let results =
            scan_dir(dir.path(), &dir.path().join("out"), &Config::default(), Dispatch::default())
                .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_scan_dir_walk_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = scan_dir(
            &dir.path().join("missing"),
            &dir.path().join("out"),
            &Config::default(),
            Dispatch::default(),
        );
        assert!(matches!(result, Err(Error::WalkDir(_))));
    }

    #[test]
    fn test_walk_error_after_emitting_discards_results() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..5).map(|i| dir.path().join(format!("v{i}.mov"))).collect();
        for file in &files {
            write_file(file, b"video bytes");
        }

        let (canceller, cancel) = cancellation();
        let (emitted_tx, emitted_rx) = bounded::<usize>(1);
        let emitted = files.clone();
        let walker = walk::spawn(cancel.clone(), move |paths, _| {
            for path in emitted {
                paths.send(path).map_err(|_| Error::WalkCanceled)?;
            }
            let _ = emitted_tx.send(files.len());
            Err(Error::Io(std::io::Error::other("directory vanished")))
        })
        .unwrap();

        let config = Config {
            workers: 2,
            ..Config::default()
        };
        let result = scan_paths(
            walker,
            canceller,
            cancel,
            &dir.path().join("out"),
            &config,
            Dispatch::default(),
        );

        // Every path reached a digester before the walk failed
        assert_eq!(emitted_rx.recv().unwrap(), 5);
        match result {
            Err(Error::Io(e)) => assert_eq!(e.to_string(), "directory vanished"),
            other => panic!("expected the walk error, got {other:?}"),
        }
    }
}
