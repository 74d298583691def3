//! Token extraction helpers shared by the structural parser, the regex
//! fallback, and the grouping engine's normalized-hash matcher
//! (`spec.md` §4.1, §4.6 "strip volatile tokens").

use regex::Regex;
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d])(19\d{2}|20\d{2})(?:[^\d]|$)").unwrap());
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bv(\d{1,2})\b").unwrap());
static RELEASE_GROUP_BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]").unwrap());
static RELEASE_GROUP_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([A-Za-z0-9]+)(?:\.\w+)?$").unwrap());

const RESOLUTIONS: &[&str] = &[
    "2160p", "4K", "UHD", "1080p", "720p", "576p", "480p", "360p",
];

const SOURCES: &[&str] = &[
    "BluRay", "Bluray", "BDRip", "BRRip", "WEBRip", "WEB-DL", "WebDl", "HDTV", "SDTV", "DVDRip",
    "DVD", "CAM", "HDCAM", "HDRip",
];

const CODECS: &[&str] = &["x264", "x265", "HEVC", "AVC", "H264", "H265", "10bit"];

const AUDIO_TAGS: &[&str] = &["AAC", "DTS", "FLAC", "AC3", "EAC3", "Opus"];

/// Extracts a 4-digit year in `1900..=2100`, surrounded by non-digits.
pub fn extract_year(filename: &str) -> Option<u32> {
    let captures = YEAR_RE.captures(filename)?;
    let year: u32 = captures.get(1)?.as_str().parse().ok()?;
    (1900..=2100).contains(&year).then_some(year)
}

/// Extracts the first matching quality/resolution tag.
pub fn extract_resolution(filename: &str) -> Option<String> {
    RESOLUTIONS
        .iter()
        .find(|res| filename.contains(*res))
        .map(|res| res.to_string())
}

/// Extracts the first matching source tag (BluRay, WEB-DL, HDTV, ...).
pub fn extract_source(filename: &str) -> Option<String> {
    SOURCES
        .iter()
        .find(|src| filename.contains(*src))
        .map(|src| src.to_string())
}

/// Extracts the first matching video codec tag.
pub fn extract_codec(filename: &str) -> Option<String> {
    CODECS
        .iter()
        .find(|codec| filename.to_lowercase().contains(&codec.to_lowercase()))
        .map(|codec| codec.to_string())
}

/// Extracts the first matching audio codec tag.
pub fn extract_audio(filename: &str) -> Option<String> {
    AUDIO_TAGS
        .iter()
        .find(|tag| filename.contains(*tag))
        .map(|tag| tag.to_string())
}

/// Extracts a release-group name, preferring the anime-style leading
/// `[Group]` bracket over the scene-style trailing `-GROUP` suffix.
pub fn extract_release_group(filename: &str) -> Option<String> {
    if let Some(captures) = RELEASE_GROUP_BRACKET_RE.captures(filename) {
        return Some(captures.get(1)?.as_str().trim().to_string());
    }
    let stem = strip_extension(filename);
    RELEASE_GROUP_SUFFIX_RE
        .captures(&stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extracts a release-version suffix (`v2` -> `2`); absent means `v1`.
pub fn extract_version(filename: &str) -> Option<u32> {
    VERSION_RE
        .captures(filename)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Strips a known video extension from the end of a filename.
pub fn strip_extension(filename: &str) -> String {
    static EXT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\.(mkv|mp4|avi|mov|wmv|flv|webm|m4v|mpg|mpeg)$").unwrap()
    });
    EXT_RE.replace(filename, "").to_string()
}

/// Collapses whitespace/separators and trims stray punctuation from a title
/// candidate, used by both parsers and by the grouping engine's
/// canonicalization step.
pub fn normalize_whitespace(title: &str) -> String {
    let replaced = title.replace(['.', '_'], " ");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_year_within_bounds() {
        assert_eq!(extract_year("Movie.2023.1080p.mkv"), Some(2023));
        assert_eq!(extract_year("Movie (2023)"), Some(2023));
        assert_eq!(extract_year("Movie.mkv"), None);
        assert_eq!(extract_year("12345.mkv"), None);
    }

    #[test]
    fn extracts_resolution() {
        assert_eq!(
            extract_resolution("Movie.1080p.BluRay.mkv"),
            Some("1080p".to_string())
        );
        assert_eq!(extract_resolution("Movie.mkv"), None);
    }

    #[test]
    fn extracts_bracketed_release_group() {
        assert_eq!(
            extract_release_group("[SubsPlease] Jujutsu Kaisen - 24 (1080p) [E82B1F6A].mkv"),
            Some("SubsPlease".to_string())
        );
    }

    #[test]
    fn extracts_version_suffix() {
        assert_eq!(extract_version("Show S01E01 v2 1080p.mkv"), Some(2));
        assert_eq!(extract_version("Show S01E01 1080p.mkv"), None);
    }
}
