//! Filesystem seam crossed by the scan pipeline, the organizer, and the
//! journal (`spec.md` §4.5, §4.8).
//!
//! The three operations here are exactly what those callers need: does a
//! path exist, what does a directory contain, and how big/old is a file.
//! Everything else (the actual move/rename on apply and rollback) goes
//! straight through `tokio::fs` in `organize`/`journal`, so this trait
//! stays read-only and easy to fake in tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

/// Lightweight metadata needed by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Async directory iterator, analogous to `tokio::fs::ReadDir`.
#[async_trait]
pub trait ReadDirStream: Send {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, String>;
}

/// Read-only filesystem seam: existence checks, directory listing, and
/// metadata, the three things the scan/organize/journal pipeline asks of a
/// filesystem without ever needing to mutate it directly.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn path_exists(&self, path: &Path) -> bool;
    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream>, String>;
    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String>;
}

/// Real filesystem implementation backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream>, String> {
        let rd = tokio::fs::read_dir(path)
            .await
            .map_err(|e| format!("read_dir failed for {path:?}: {e}"))?;
        Ok(Box::new(RealReadDir { inner: rd }))
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String> {
        let md = tokio::fs::metadata(path)
            .await
            .map_err(|e| format!("metadata failed for {path:?}: {e}"))?;
        Ok(FsMetadata {
            is_dir: md.is_dir(),
            is_file: md.is_file(),
            len: md.len(),
            modified: md.modified().ok(),
        })
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, String> {
        match self.inner.next_entry().await {
            Ok(Some(entry)) => Ok(Some(entry.path())),
            Ok(None) => Ok(None),
            Err(e) => Err(format!("next_entry failed: {e}")),
        }
    }
}

/// In-memory filesystem for deterministic scan-pipeline tests.
///
/// Entries live in a flat, path-sorted map; directories don't need to be
/// registered explicitly (unlike a real filesystem) — any path that is a
/// prefix of a registered file or directory is treated as an implicit
/// directory, and `read_dir` derives its listing on the fly by scanning for
/// direct children instead of maintaining a parallel children index.
#[derive(Default, Clone)]
pub struct InMemoryFs {
    entries: BTreeMap<PathBuf, InMemoryEntry>,
}

#[derive(Clone, Copy)]
enum InMemoryEntry {
    Dir,
    File { len: u64 },
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&mut self, path: impl Into<PathBuf>) {
        self.entries.entry(path.into()).or_insert(InMemoryEntry::Dir);
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, len: u64) {
        self.entries.insert(path.into(), InMemoryEntry::File { len });
    }

    /// Direct children of `dir`, in path order, derived from every
    /// registered entry rather than a maintained children list.
    fn children_of(&self, dir: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect()
    }

    fn is_implicit_dir(&self, path: &Path) -> bool {
        self.entries.keys().any(|p| p.parent() == Some(path))
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn path_exists(&self, path: &Path) -> bool {
        self.entries.contains_key(path) || self.is_implicit_dir(path)
    }

    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream>, String> {
        if matches!(self.entries.get(path), Some(InMemoryEntry::File { .. })) {
            return Err(format!("{path:?} is a file, not a directory"));
        }
        let children = self.children_of(path);
        if children.is_empty() && !matches!(self.entries.get(path), Some(InMemoryEntry::Dir)) {
            return Err(format!("{path:?} does not exist"));
        }
        Ok(Box::new(InMemoryReadDir {
            remaining: children.into_iter(),
        }))
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String> {
        match self.entries.get(path) {
            Some(InMemoryEntry::Dir) => Ok(FsMetadata {
                is_dir: true,
                is_file: false,
                len: 0,
                modified: None,
            }),
            Some(InMemoryEntry::File { len }) => Ok(FsMetadata {
                is_dir: false,
                is_file: true,
                len: *len,
                modified: Some(SystemTime::now()),
            }),
            None if self.is_implicit_dir(path) => Ok(FsMetadata {
                is_dir: true,
                is_file: false,
                len: 0,
                modified: None,
            }),
            None => Err(format!("{path:?} does not exist")),
        }
    }
}

struct InMemoryReadDir {
    remaining: std::vec::IntoIter<PathBuf>,
}

#[async_trait]
impl ReadDirStream for InMemoryReadDir {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, String> {
        Ok(self.remaining.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_fs_walks_children() {
        let mut fs = InMemoryFs::new();
        fs.add_dir("/root");
        fs.add_file("/root/a.mkv", 10);
        fs.add_file("/root/b.mkv", 20);

        let mut rd = fs.read_dir(Path::new("/root")).await.unwrap();
        let mut seen = Vec::new();
        while let Some(entry) = rd.next_entry().await.unwrap() {
            seen.push(entry);
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![PathBuf::from("/root/a.mkv"), PathBuf::from("/root/b.mkv")]
        );
    }
}
