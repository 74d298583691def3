//! Bounded producer/consumer scan pipeline (`spec.md` §4.5).
//!
//! Grounded on the teacher's worker-pool scanner (`ferrex-core::scanner`):
//! a bounded `tokio::sync::mpsc` channel applies backpressure between the
//! directory walker and a fixed pool of parse workers, rather than
//! buffering every discovered path in memory before parsing starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use anivault_model::scan::ScannedFile;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use crate::fs::FileSystem;
use crate::parser::FilenameParser;

/// Default bound on the path-discovery-to-parse-worker channel
/// (`spec.md` §4.5).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Extensions scanned by default when a caller doesn't override the
/// allow-list.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "webm", "m4v"];

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub roots: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub queue_capacity: usize,
    pub worker_count: usize,
}

impl ScanConfig {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: 4,
        }
    }

    fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

/// Aggregate result of one scan run: the files successfully stat'd and
/// parsed, and per-path failures that didn't abort the run
/// (`spec.md` §4.5 "per-file stat failures are isolated").
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    pub failures: Vec<(PathBuf, String)>,
}

/// Walks `config.roots`, discovering files with an allowed extension and
/// handing them to a fixed pool of parse workers over a bounded channel.
/// A stat failure on one file is recorded in `ScanOutcome::failures` and
/// does not abort the scan.
pub async fn scan(
    fs: Arc<dyn FileSystem>,
    config: ScanConfig,
    cancel: tokio_util::sync::CancellationToken,
) -> EngineResult<ScanOutcome> {
    let (tx, rx) = mpsc::channel::<PathBuf>(config.queue_capacity);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    let walk_fs = fs.clone();
    let walk_roots = config.roots.clone();
    let walk_extensions = config.clone();
    let walk_cancel = cancel.clone();
    let walker = tokio::spawn(async move {
        for root in walk_roots {
            if walk_cancel.is_cancelled() {
                break;
            }
            walk_dir(&*walk_fs, &root, &walk_extensions, &tx, &walk_cancel).await;
        }
    });

    let parser = Arc::new(FilenameParser::new());
    let mut workers = Vec::with_capacity(config.worker_count);
    for _ in 0..config.worker_count.max(1) {
        let rx = rx.clone();
        let fs = fs.clone();
        let parser = parser.clone();
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            let mut files = Vec::new();
            let mut failures = Vec::new();
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let path = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };
                let Some(path) = path else { break };
                match fs.metadata(&path).await {
                    Ok(meta) => {
                        let filename = path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or_default();
                        let parsed = parser.parse(filename);
                        let modified_at: DateTime<Utc> = meta
                            .modified
                            .map(DateTime::<Utc>::from)
                            .unwrap_or_else(Utc::now);
                        files.push(ScannedFile::new(path, meta.len, parsed, modified_at));
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "scan: stat failed");
                        failures.push((path, err));
                    }
                }
            }
            (files, failures)
        }));
    }

    walker
        .await
        .map_err(|e| cancellation("scan.walk", e.to_string()))?;

    let mut outcome = ScanOutcome::default();
    for worker in workers {
        let (files, failures) = worker
            .await
            .map_err(|e| cancellation("scan.worker", e.to_string()))?;
        outcome.files.extend(files);
        outcome.failures.extend(failures);
    }

    Ok(outcome)
}

fn cancellation(operation: &'static str, message: String) -> EngineError {
    EngineError::Cancellation {
        context: ErrorContext::new(operation).with_subject(message),
    }
}

async fn walk_dir(
    fs: &dyn FileSystem,
    dir: &Path,
    config: &ScanConfig,
    tx: &mpsc::Sender<PathBuf>,
    cancel: &tokio_util::sync::CancellationToken,
) {
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        if cancel.is_cancelled() {
            return;
        }
        let mut reader = match fs.read_dir(&current).await {
            Ok(reader) => reader,
            Err(err) => {
                warn!(path = %current.display(), error = %err, "scan: read_dir failed");
                continue;
            }
        };

        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(path = %current.display(), error = %err, "scan: next_entry failed");
                    break;
                }
            };

            match fs.metadata(&entry).await {
                Ok(meta) if meta.is_dir => stack.push(entry),
                Ok(meta) if meta.is_file && config.has_allowed_extension(&entry) => {
                    if tx.send(entry).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(path = %entry.display(), error = %err, "scan: metadata failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn sample_fs() -> InMemoryFs {
        let mut fs = InMemoryFs::new();
        fs.add_dir("/lib");
        fs.add_dir("/lib/show");
        fs.add_file("/lib/show/[Group] Show - 01 (1080p).mkv", 100);
        fs.add_file("/lib/show/notes.txt", 10);
        fs.add_file("/lib/show/Show.S01E02.mp4", 200);
        fs
    }

    #[tokio::test]
    async fn scans_allowed_extensions_and_skips_others() {
        let fs: Arc<dyn FileSystem> = Arc::new(sample_fs());
        let config = ScanConfig::new(vec![PathBuf::from("/lib")]);
        let cancel = tokio_util::sync::CancellationToken::new();

        let outcome = scan(fs, config, cancel).await.unwrap();
        assert_eq!(outcome.files.len(), 2);
        assert!(outcome.failures.is_empty());
        assert!(outcome
            .files
            .iter()
            .all(|f| f.basename() != "notes.txt"));
    }

    #[tokio::test]
    async fn empty_root_yields_no_files() {
        let mut fs = InMemoryFs::new();
        fs.add_dir("/empty");
        let fs: Arc<dyn FileSystem> = Arc::new(fs);
        let config = ScanConfig::new(vec![PathBuf::from("/empty")]);
        let cancel = tokio_util::sync::CancellationToken::new();

        let outcome = scan(fs, config, cancel).await.unwrap();
        assert!(outcome.files.is_empty());
    }
}
