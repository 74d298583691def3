//! Filename parsing facade (`spec.md` §4.1).
//!
//! Grounded on `ferrex-core::metadata::filename_parser::FilenameParser`'s
//! overall shape (primary parse attempt, fallback on failure, confidence
//! scoring) but rebuilt around two independent stages instead of one
//! monolithic regex cascade: [`structural`] for the high-fidelity shapes
//! AniVault expects to see most, and [`fallback`] for everything else.

mod fallback;
mod structural;
mod tokens;

use std::path::Path;

use anivault_model::scan::{ParseResult, ScannedFile};
use chrono::{DateTime, Utc};

pub use tokens::{
    extract_audio, extract_codec, extract_release_group, extract_resolution, extract_source,
    extract_version, extract_year, normalize_whitespace, strip_extension,
};

/// Stateless filename parser. Holds no configuration today but is kept as a
/// type (rather than free functions) so call sites read the same way the
/// teacher's `FilenameParser` does, and so per-library overrides have
/// somewhere to live later.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilenameParser;

impl FilenameParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses a single filename, trying the structural parser first and
    /// falling back to the ordered regex list when it rejects the input or
    /// leaves it under-filled.
    pub fn parse(&self, filename: &str) -> ParseResult {
        let stem = tokens::strip_extension(filename);

        let structural_result = structural::parse(&stem);
        if let Some(result) = &structural_result {
            if result.is_good_enough() {
                return finalize(result.clone(), &stem);
            }
        }

        let fallback_result = fallback::parse(&stem);

        let chosen = pick_better(structural_result, fallback_result);
        match chosen {
            Some(result) => finalize(result, &stem),
            None => ParseResult::empty(tokens::normalize_whitespace(&stem)),
        }
    }

    /// Parses every path in `paths`, building a [`ScannedFile`] for each.
    /// `size_bytes`/`modified_at` are supplied per path since this facade has
    /// no filesystem access of its own (the scan pipeline owns that).
    pub fn parse_batch(
        &self,
        entries: impl IntoIterator<Item = (impl AsRef<Path>, u64, DateTime<Utc>)>,
    ) -> Vec<ScannedFile> {
        entries
            .into_iter()
            .map(|(path, size_bytes, modified_at)| {
                let path = path.as_ref().to_path_buf();
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                let parsed = self.parse(filename);
                ScannedFile::new(path, size_bytes, parsed, modified_at)
            })
            .collect()
    }
}

/// Picks whichever candidate is structurally richer: episode presence beats
/// its absence, season presence is the next tiebreaker, and a longer cleaned
/// title wins any remaining tie (longer usually means less was truncated).
fn pick_better(primary: Option<ParseResult>, fallback: Option<ParseResult>) -> Option<ParseResult> {
    match (primary, fallback) {
        (Some(p), Some(f)) => {
            if rank(&f) > rank(&p) {
                Some(f)
            } else {
                Some(p)
            }
        }
        (Some(p), None) => Some(p),
        (None, Some(f)) => Some(f),
        (None, None) => None,
    }
}

fn rank(result: &ParseResult) -> (u8, u8, usize) {
    (
        result.episode.is_some() as u8,
        result.season.is_some() as u8,
        result.title.len(),
    )
}

/// Applies the confidence formula from `spec.md` §4.1: a 0.5 base, +0.2 for
/// a title of at least 3 characters, +0.2 for an episode number, +0.1 for a
/// quality tag or season number, clamped to `[0, 1]`.
fn finalize(mut result: ParseResult, stem: &str) -> ParseResult {
    if let Some(year) = tokens::extract_year(stem) {
        result.other.insert("year".to_string(), year.to_string());
    }

    let mut confidence: f32 = 0.5;
    if result.title.chars().count() >= 3 {
        confidence += 0.2;
    }
    if result.episode.is_some() {
        confidence += 0.2;
    }
    if result.quality.is_some() || result.season.is_some() {
        confidence += 0.1;
    }
    result.confidence = confidence.clamp(0.0, 1.0);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anime_release_with_high_confidence() {
        let parser = FilenameParser::new();
        let result = parser.parse("[SubsPlease] Jujutsu Kaisen - 24 (1080p) [E82B1F6A].mkv");
        assert_eq!(result.title, "Jujutsu Kaisen");
        assert_eq!(result.episode, Some(24));
        assert!(result.confidence >= 0.9);
    }

    #[test]
    fn parses_scene_release_via_structural_season_episode() {
        let parser = FilenameParser::new();
        let result = parser.parse("Breaking.Bad.S01E01.Pilot.1080p.BluRay.mkv");
        assert_eq!(result.season, Some(1));
        assert_eq!(result.episode, Some(1));
    }

    #[test]
    fn falls_back_to_dash_episode_pattern() {
        let parser = FilenameParser::new();
        let result = parser.parse("My Show - 05 WEBRip.mkv");
        assert_eq!(result.title, "My Show");
        assert_eq!(result.episode, Some(5));
        assert_eq!(result.provenance, anivault_model::scan::ParserProvenance::RegexFallback);
    }

    #[test]
    fn unparseable_filename_yields_zero_confidence() {
        let parser = FilenameParser::new();
        let result = parser.parse("xyz");
        assert_eq!(result.confidence, 0.0);
        assert!(result.episode.is_none());
    }
}
