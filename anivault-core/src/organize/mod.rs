//! Organizer: turns enriched groups into a deterministic [`Plan`], and
//! applies it (`spec.md` §4.8).

use std::path::{Path, PathBuf};

use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use anivault_model::group::Group;
use anivault_model::metadata::{EnrichedMetadata, MediaKind};
use anivault_model::plan::{ConflictPolicy, Operation, Plan, PlanItem};
use anivault_model::scan::ScannedFile;
use chrono::Utc;

use crate::fs::FileSystem;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_BYTES: usize = 255;

#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub target_root: PathBuf,
    pub operation: Operation,
    pub conflict_policy: ConflictPolicy,
    pub organize_by_resolution: bool,
}

impl OrganizeOptions {
    pub fn new(target_root: impl Into<PathBuf>) -> Self {
        Self {
            target_root: target_root.into(),
            operation: Operation::Move,
            conflict_policy: ConflictPolicy::Skip,
            organize_by_resolution: false,
        }
    }
}

/// Replaces forbidden characters with `_`, trims trailing dots/spaces, and
/// caps the result at 255 UTF-8 bytes (`spec.md` §4.8).
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_end_matches(['.', ' ']);

    let mut out = String::new();
    for ch in trimmed.chars() {
        if out.len() + ch.len_utf8() > MAX_FILENAME_BYTES {
            break;
        }
        out.push(ch);
    }
    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}

fn media_dir(kind: Option<MediaKind>) -> &'static str {
    match kind {
        Some(MediaKind::Movie) => "movies",
        _ => "series",
    }
}

/// Release filename in the form `{title} - S{season:02}E{episode:02} -
/// {quality}.{ext}`, with season defaulted the same way
/// [`crate::grouping::matchers`]'s `SeasonEpisodeMatcher` does (`spec.md` §8
/// scenario 1).
fn episode_filename(metadata: &EnrichedMetadata, file: &ScannedFile, season: u32) -> String {
    let episode = file.parsed.episode.unwrap_or(0);
    let quality = file.parsed.quality.as_deref().unwrap_or("unknown");
    let stem = format!(
        "{} - S{season:02}E{episode:02} - {quality}",
        metadata.canonical_title
    );
    match file.path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

fn destination_for(
    options: &OrganizeOptions,
    metadata: &EnrichedMetadata,
    file: &ScannedFile,
) -> PathBuf {
    let mut path = options.target_root.clone();
    path.push(media_dir(metadata.media_kind));
    path.push(sanitize_filename(&metadata.canonical_title));

    let season = file.parsed.season.unwrap_or(1);
    if !matches!(metadata.media_kind, Some(MediaKind::Movie)) {
        path.push(sanitize_filename(&format!("Season {season:02}")));
    }

    if options.organize_by_resolution {
        let resolution = file.parsed.quality.as_deref().unwrap_or("unknown");
        path.push(sanitize_filename(resolution));
    }

    path.push(sanitize_filename(&episode_filename(metadata, file, season)));
    path
}

/// Builds a deterministic [`Plan`] from enriched groups, performing no
/// filesystem I/O (`spec.md` §4.8 "dry-run").
pub fn plan(groups: &[(Group, EnrichedMetadata)], options: &OrganizeOptions) -> Plan {
    let mut items = Vec::new();
    for (group, metadata) in groups {
        for file in &group.files {
            let destination = destination_for(options, metadata, file);
            items.push(PlanItem {
                source: file.path.clone(),
                destination,
                operation: options.operation,
                conflict_policy: options.conflict_policy,
                metadata_ref: Some(group.id.to_string()),
            });
        }
    }
    Plan::new(items, Utc::now())
}

/// Executes a plan's items in order against `fs`, applying the conflict
/// policy at each destination. Returns the number of items actually
/// performed (items skipped under the `skip` policy don't count).
///
/// Journaling (intent/outcome records) is the caller's responsibility via
/// [`crate::journal`]; this function only performs the filesystem mutation.
pub async fn apply_item(fs: &dyn FileSystem, item: &PlanItem) -> EngineResult<bool> {
    let exists = fs.path_exists(&item.destination).await;
    let destination = if exists {
        match item.conflict_policy {
            ConflictPolicy::Skip => return Ok(false),
            ConflictPolicy::Overwrite => item.destination.clone(),
            ConflictPolicy::Suffix => find_suffixed_path(fs, &item.destination).await,
        }
    } else {
        item.destination.clone()
    };

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| organize_err("organizer.apply", parent.display().to_string(), e))?;
    }

    match item.operation {
        Operation::Move => {
            tokio::fs::rename(&item.source, &destination)
                .await
                .map_err(|e| organize_err("organizer.apply", destination.display().to_string(), e))?;
        }
        Operation::Copy => {
            tokio::fs::copy(&item.source, &destination)
                .await
                .map_err(|e| organize_err("organizer.apply", destination.display().to_string(), e))?;
        }
        Operation::Link => {
            tokio::fs::hard_link(&item.source, &destination)
                .await
                .map_err(|e| organize_err("organizer.apply", destination.display().to_string(), e))?;
        }
    }

    Ok(true)
}

async fn find_suffixed_path(fs: &dyn FileSystem, original: &Path) -> PathBuf {
    let stem = original.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let ext = original.extension().and_then(|s| s.to_str());
    let parent = original.parent().unwrap_or_else(|| Path::new(""));

    for n in 1..10_000 {
        let candidate_name = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = parent.join(candidate_name);
        if !fs.path_exists(&candidate).await {
            return candidate;
        }
    }
    original.to_path_buf()
}

fn organize_err(operation: &'static str, subject: String, source: std::io::Error) -> EngineError {
    EngineError::storage_failure(
        ErrorContext::new(operation).with_subject(subject),
        source.to_string(),
        Some(Box::new(source)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_forbidden_characters() {
        assert_eq!(sanitize_filename("a/b:c*d"), "a_b_c_d");
    }

    #[test]
    fn sanitize_trims_trailing_dots_and_spaces() {
        assert_eq!(sanitize_filename("Show Title.  "), "Show Title");
    }

    #[test]
    fn sanitize_caps_at_255_bytes() {
        let long = "a".repeat(400);
        let sanitized = sanitize_filename(&long);
        assert!(sanitized.len() <= MAX_FILENAME_BYTES);
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize_filename("..."), "_");
    }

    #[test]
    fn destination_path_includes_season_folder() {
        use anivault_model::metadata::EnrichStatus;
        use anivault_model::scan::ParseResult;
        use chrono::Utc;

        let mut parsed = ParseResult::empty("Show");
        parsed.season = Some(2);
        let file = ScannedFile::new("/src/show.mkv", 10, parsed, Utc::now());

        let metadata = EnrichedMetadata {
            canonical_title: "Show".to_string(),
            remote_id: Some(1),
            media_kind: Some(MediaKind::Tv),
            first_air_date: None,
            scores: Vec::new(),
            overall_score: 0.9,
            status: EnrichStatus::Matched,
        };

        let options = OrganizeOptions::new("/library");
        let dest = destination_for(&options, &metadata, &file);
        assert_eq!(
            dest,
            PathBuf::from("/library/series/Show/Season 02/Show - S02E00 - unknown.mkv")
        );
    }
}
