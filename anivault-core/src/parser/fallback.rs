//! Ordered regex fallback list (`spec.md` §4.1 step 2), tried in order when
//! the structural parser rejects the filename or leaves it under-filled.
//! The first pattern that matches and yields a non-empty title wins.

use std::sync::LazyLock;

use anivault_model::scan::{ParseResult, ParserProvenance};
use regex::Regex;

use super::tokens;

static RELEASE_GROUP_EPISODE_QUALITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\[(?P<group>[^\]]+)\]\s*(?P<title>.+?)\s*-\s*(?P<episode>\d{1,4})\s*\(?(?P<quality>\d{3,4}p)?\)?").unwrap()
});

static TITLE_SEASON_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[.\s_-]+s(?P<season>\d{1,3})e(?P<episode>\d{1,4})").unwrap()
});

static TITLE_DASH_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<title>.+?)\s*-\s*(?P<episode>\d{1,4})\b").unwrap());

static TITLE_EP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[.\s_-]+ep\.?\s*(?P<episode>\d{1,4})\b").unwrap()
});

static TITLE_UNDERSCORE_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<title>.+?)_(?P<episode>\d{1,4})(?:_|\.|$)").unwrap());

static TITLE_DOT_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<title>.+?)\.(?P<episode>\d{1,4})\.").unwrap());

/// Runs every pattern in spec order and returns the first candidate with a
/// non-empty cleaned title.
pub fn parse(stem: &str) -> Option<ParseResult> {
    try_release_group_episode_quality(stem)
        .or_else(|| try_title_season_episode(stem))
        .or_else(|| try_title_dash_episode(stem))
        .or_else(|| try_title_ep(stem))
        .or_else(|| try_title_underscore_episode(stem))
        .or_else(|| try_title_dot_episode(stem))
}

fn base_result(title: String, stem: &str) -> ParseResult {
    ParseResult {
        title,
        season: None,
        episode: None,
        version: tokens::extract_version(stem),
        quality: tokens::extract_resolution(stem),
        release_group: tokens::extract_release_group(stem),
        source: tokens::extract_source(stem),
        codec: tokens::extract_codec(stem),
        audio: tokens::extract_audio(stem),
        other: Default::default(),
        confidence: 0.0,
        provenance: ParserProvenance::RegexFallback,
    }
}

fn try_release_group_episode_quality(stem: &str) -> Option<ParseResult> {
    let c = RELEASE_GROUP_EPISODE_QUALITY.captures(stem)?;
    let title = tokens::normalize_whitespace(c.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let mut result = base_result(title, stem);
    result.episode = c.name("episode")?.as_str().parse().ok();
    result.release_group = Some(c.name("group")?.as_str().trim().to_string());
    if let Some(q) = c.name("quality") {
        result.quality = Some(q.as_str().to_string());
    }
    Some(result)
}

fn try_title_season_episode(stem: &str) -> Option<ParseResult> {
    let c = TITLE_SEASON_EPISODE.captures(stem)?;
    let title = tokens::normalize_whitespace(c.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let mut result = base_result(title, stem);
    result.season = c.name("season")?.as_str().parse().ok();
    result.episode = c.name("episode")?.as_str().parse().ok();
    Some(result)
}

fn try_title_dash_episode(stem: &str) -> Option<ParseResult> {
    let c = TITLE_DASH_EPISODE.captures(stem)?;
    let title = tokens::normalize_whitespace(c.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let mut result = base_result(title, stem);
    result.episode = c.name("episode")?.as_str().parse().ok();
    Some(result)
}

fn try_title_ep(stem: &str) -> Option<ParseResult> {
    let c = TITLE_EP.captures(stem)?;
    let title = tokens::normalize_whitespace(c.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let mut result = base_result(title, stem);
    result.episode = c.name("episode")?.as_str().parse().ok();
    Some(result)
}

fn try_title_underscore_episode(stem: &str) -> Option<ParseResult> {
    let c = TITLE_UNDERSCORE_EPISODE.captures(stem)?;
    let title = tokens::normalize_whitespace(c.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let mut result = base_result(title, stem);
    result.episode = c.name("episode")?.as_str().parse().ok();
    Some(result)
}

fn try_title_dot_episode(stem: &str) -> Option<ParseResult> {
    let c = TITLE_DOT_EPISODE.captures(stem)?;
    let title = tokens::normalize_whitespace(c.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let mut result = base_result(title, stem);
    result.episode = c.name("episode")?.as_str().parse().ok();
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_title_dash_episode() {
        let r = parse("My Show - 05 WEBRip").expect("should match");
        assert_eq!(r.title, "My Show");
        assert_eq!(r.episode, Some(5));
    }

    #[test]
    fn matches_title_ep_pattern() {
        let r = parse("Some Show EP12 1080p").expect("should match");
        assert_eq!(r.title, "Some Show");
        assert_eq!(r.episode, Some(12));
    }

    #[test]
    fn matches_title_underscore_episode() {
        let r = parse("Another_Show_07_1080p").expect("should match");
        assert_eq!(r.episode, Some(7));
    }

    #[test]
    fn falls_through_when_nothing_matches() {
        assert!(parse("no episode markers here at all").is_none());
    }
}
