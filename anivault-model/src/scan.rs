//! Scan pipeline data model: `spec.md` §3 `ScannedFile` and `ParseResult`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which parser strategy produced a [`ParseResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParserProvenance {
    /// The high-fidelity structural parser (`spec.md` §4.1 step 1).
    Structural,
    /// The ordered regex fallback list (`spec.md` §4.1 step 2).
    RegexFallback,
    /// Neither parser produced a usable result.
    Fallback,
}

/// Structured extraction of one filename (`spec.md` §3 `ParseResult`).
///
/// Never panics on malformed input; a fully-empty `title` with
/// `confidence == 0.0` is a valid result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Release version suffix, e.g. `2` for a filename containing `v2`.
    pub version: Option<u32>,
    pub quality: Option<String>,
    pub release_group: Option<String>,
    pub source: Option<String>,
    pub codec: Option<String>,
    pub audio: Option<String>,
    /// Any other tokens recognized but not otherwise modeled, keyed by tag name.
    pub other: BTreeMap<String, String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub provenance: ParserProvenance,
}

impl ParseResult {
    /// An empty result for completely unparseable input (`spec.md` §4.1, §8).
    pub fn empty(stripped_title: impl Into<String>) -> Self {
        Self {
            title: stripped_title.into(),
            season: None,
            episode: None,
            version: None,
            quality: None,
            release_group: None,
            source: None,
            codec: None,
            audio: None,
            other: BTreeMap::new(),
            confidence: 0.0,
            provenance: ParserProvenance::Fallback,
        }
    }

    /// Whether this result carries enough structure to be "good enough"
    /// without consulting the regex fallback (`spec.md` §4.1 step 1).
    pub fn is_good_enough(&self) -> bool {
        !self.title.trim().is_empty() && (self.episode.is_some() || self.season.is_some())
    }
}

/// One discovered source file (`spec.md` §3 `ScannedFile`).
///
/// Created once by the scanner and never mutated afterward. `path` is the
/// instance's identity within a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub parsed: ParseResult,
    pub modified_at: DateTime<Utc>,
}

impl ScannedFile {
    pub fn new(
        path: impl Into<PathBuf>,
        size_bytes: u64,
        parsed: ParseResult,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            parsed,
            modified_at,
        }
    }

    pub fn basename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
