//! Primary, high-fidelity structural parser (`spec.md` §4.1 step 1).
//!
//! Targets the release-naming convention AniVault sees most often:
//! `[ReleaseGroup] Title - NN (Quality) [Hash].ext`, plus the common
//! `Title.SxxEyy.Quality.ext` scene convention. Returns `None` rather than a
//! low-confidence guess when the filename doesn't fit either shape cleanly,
//! so the caller falls through to the regex fallback list.

use std::sync::LazyLock;

use anivault_model::scan::{ParseResult, ParserProvenance};
use regex::Regex;

use super::tokens;

static ANIME_BRACKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\[(?P<group>[^\]]+)\]\s*
        (?P<title>.+?)\s*-\s*
        (?P<episode>\d{1,4})
        (?:v(?P<version>\d{1,2}))?
        (?:\s*\((?P<quality>[^)]+)\))?
        ",
    )
    .unwrap()
});

static SEASON_EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[.\s_-]+s(?P<season>\d{1,3})e(?P<episode>\d{1,4})").unwrap()
});

/// Attempts the structural parse. Returns `None` when neither structural
/// shape applies.
pub fn parse(stem: &str) -> Option<ParseResult> {
    parse_anime_bracket(stem).or_else(|| parse_season_episode(stem))
}

fn parse_anime_bracket(stem: &str) -> Option<ParseResult> {
    let captures = ANIME_BRACKET_RE.captures(stem)?;
    let title = tokens::normalize_whitespace(captures.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let episode: u32 = captures.name("episode")?.as_str().parse().ok()?;
    let version = captures
        .name("version")
        .and_then(|m| m.as_str().parse().ok());
    let quality = captures.name("quality").map(|m| m.as_str().to_string());
    let release_group = Some(captures.name("group")?.as_str().trim().to_string());

    Some(ParseResult {
        title,
        season: None,
        episode: Some(episode),
        version,
        quality: quality.or_else(|| tokens::extract_resolution(stem)),
        release_group,
        source: tokens::extract_source(stem),
        codec: tokens::extract_codec(stem),
        audio: tokens::extract_audio(stem),
        other: Default::default(),
        confidence: 0.0,
        provenance: ParserProvenance::Structural,
    })
}

fn parse_season_episode(stem: &str) -> Option<ParseResult> {
    let captures = SEASON_EPISODE_RE.captures(stem)?;
    let title = tokens::normalize_whitespace(captures.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let season: u32 = captures.name("season")?.as_str().parse().ok()?;
    let episode: u32 = captures.name("episode")?.as_str().parse().ok()?;

    Some(ParseResult {
        title,
        season: Some(season),
        episode: Some(episode),
        version: tokens::extract_version(stem),
        quality: tokens::extract_resolution(stem),
        release_group: tokens::extract_release_group(stem),
        source: tokens::extract_source(stem),
        codec: tokens::extract_codec(stem),
        audio: tokens::extract_audio(stem),
        other: Default::default(),
        confidence: 0.0,
        provenance: ParserProvenance::Structural,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anime_bracket_convention() {
        let result =
            parse("[SubsPlease] Jujutsu Kaisen - 24 (1080p) [E82B1F6A]").expect("should parse");
        assert_eq!(result.title, "Jujutsu Kaisen");
        assert_eq!(result.episode, Some(24));
        assert_eq!(result.quality.as_deref(), Some("1080p"));
        assert_eq!(result.release_group.as_deref(), Some("SubsPlease"));
    }

    #[test]
    fn parses_season_episode_convention() {
        let result = parse("Breaking.Bad.S01E01.Pilot.1080p.BluRay").expect("should parse");
        assert_eq!(result.title, "Breaking Bad");
        assert_eq!(result.season, Some(1));
        assert_eq!(result.episode, Some(1));
    }

    #[test]
    fn rejects_non_structural_input() {
        assert!(parse("just a random movie name").is_none());
    }
}
