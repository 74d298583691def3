//! Duplicate resolution within a final group (`spec.md` §4.6).

use anivault_model::scan::ScannedFile;

/// Quality tiers ordered worst to best; anything unrecognized sorts below
/// all of these.
const QUALITY_ORDER: &[&str] = &["480p", "720p", "1080p", "2160p"];

fn quality_rank(file: &ScannedFile) -> i32 {
    file.parsed
        .quality
        .as_deref()
        .and_then(|q| QUALITY_ORDER.iter().position(|tier| tier.eq_ignore_ascii_case(q)))
        .map(|pos| pos as i32)
        .unwrap_or(-1)
}

fn version_rank(file: &ScannedFile) -> u32 {
    // A missing version suffix is treated as v1 (`spec.md` §4.6).
    file.parsed.version.unwrap_or(1)
}

/// Orders two candidates for the same `(season, episode)` slot by priority:
/// version, then quality, then byte size, highest first.
fn better(a: &ScannedFile, b: &ScannedFile) -> std::cmp::Ordering {
    version_rank(a)
        .cmp(&version_rank(b))
        .then(quality_rank(a).cmp(&quality_rank(b)))
        .then(a.size_bytes.cmp(&b.size_bytes))
}

/// Partitions a group's files into `(representatives, losers)`: at most one
/// representative per `(season, episode)` tuple, chosen by
/// [`better`]; files lacking both season and episode are always kept as
/// their own representative since they have no slot to collide in.
pub fn resolve(files: Vec<ScannedFile>) -> (Vec<ScannedFile>, Vec<ScannedFile>) {
    use std::collections::HashMap;

    let mut slots: HashMap<(Option<u32>, Option<u32>), Vec<ScannedFile>> = HashMap::new();
    let mut unslotted = Vec::new();

    for file in files {
        match (file.parsed.season, file.parsed.episode) {
            (None, None) => unslotted.push(file),
            key => slots.entry(key).or_default().push(file),
        }
    }

    let mut representatives = unslotted;
    let mut losers = Vec::new();

    for (_, mut candidates) in slots {
        candidates.sort_by(|a, b| better(b, a));
        representatives.push(candidates.remove(0));
        losers.extend(candidates);
    }

    representatives.sort_by(|a, b| {
        a.parsed
            .season
            .cmp(&b.parsed.season)
            .then(a.parsed.episode.cmp(&b.parsed.episode))
            .then(a.path().cmp(b.path()))
    });

    (representatives, losers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anivault_model::scan::ParseResult;
    use chrono::Utc;

    fn file(season: Option<u32>, episode: Option<u32>, version: Option<u32>, quality: Option<&str>, size: u64) -> ScannedFile {
        let mut parsed = ParseResult::empty("Show");
        parsed.season = season;
        parsed.episode = episode;
        parsed.version = version;
        parsed.quality = quality.map(String::from);
        ScannedFile::new(format!("/show-{size}.mkv"), size, parsed, Utc::now())
    }

    #[test]
    fn higher_version_wins() {
        let files = vec![
            file(Some(1), Some(1), Some(1), Some("1080p"), 100),
            file(Some(1), Some(1), Some(2), Some("1080p"), 100),
        ];
        let (reps, losers) = resolve(files);
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].parsed.version, Some(2));
        assert_eq!(losers.len(), 1);
    }

    #[test]
    fn higher_quality_wins_when_versions_tie() {
        let files = vec![
            file(Some(1), Some(1), None, Some("720p"), 100),
            file(Some(1), Some(1), None, Some("2160p"), 50),
        ];
        let (reps, _) = resolve(files);
        assert_eq!(reps[0].parsed.quality.as_deref(), Some("2160p"));
    }

    #[test]
    fn larger_size_wins_when_version_and_quality_tie() {
        let files = vec![
            file(Some(1), Some(1), None, Some("1080p"), 100),
            file(Some(1), Some(1), None, Some("1080p"), 500),
        ];
        let (reps, losers) = resolve(files);
        assert_eq!(reps[0].size_bytes, 500);
        assert_eq!(losers[0].size_bytes, 100);
    }

    #[test]
    fn files_without_season_or_episode_are_never_deduplicated() {
        let files = vec![file(None, None, None, None, 10), file(None, None, None, None, 20)];
        let (reps, losers) = resolve(files);
        assert_eq!(reps.len(), 2);
        assert!(losers.is_empty());
    }
}
