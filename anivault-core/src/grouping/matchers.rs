//! Concrete matchers (`spec.md` §4.6).

use std::collections::HashMap;

use anivault_model::scan::ScannedFile;

use crate::parser::normalize_whitespace;

/// One cluster proposed by a single matcher.
#[derive(Debug, Clone)]
pub struct GroupCandidate {
    /// Synthetic key identifying this cluster within its matcher.
    pub key: String,
    /// Indices into the file slice passed to [`Matcher::find_candidates`].
    pub members: Vec<usize>,
}

/// A clustering strategy over a batch of scanned files.
///
/// Object-safe so the orchestrator can run a heterogeneous list of matchers
/// without generics leaking into [`super::group`].
pub trait Matcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn find_candidates(&self, files: &[ScannedFile]) -> Vec<GroupCandidate>;
}

const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Canonical title used by every matcher for grouping keys and scoring,
/// never shown to the user as-is.
pub fn canonical_title(file: &ScannedFile) -> String {
    normalize_whitespace(&file.parsed.title).to_lowercase()
}

/// Groups files whose canonical titles are mutually similar, using a
/// normalized edit-distance ratio. A length-delta guard skips the expensive
/// distance computation for pairs that cannot possibly clear the
/// threshold, keeping the matcher roughly linear on well-formed libraries.
pub struct TitleSimilarityMatcher {
    threshold: f64,
}

impl Default for TitleSimilarityMatcher {
    fn default() -> Self {
        Self {
            threshold: TITLE_SIMILARITY_THRESHOLD,
        }
    }
}

impl TitleSimilarityMatcher {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    fn similar(&self, a: &str, b: &str) -> bool {
        title_similarity(a, b) >= self.threshold
    }
}

/// Normalized similarity in `[0, 1]` between two titles. Public so the
/// enricher's title scorer can reuse the same metric (`spec.md` §4.7).
pub fn title_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    // Two titles differing in length by more than half the longer one can
    // never reach a typical acceptance threshold; skip the O(n*m) distance.
    let len_delta = a.chars().count().abs_diff(b.chars().count());
    if len_delta as f64 / max_len as f64 > 0.5 {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

impl Matcher for TitleSimilarityMatcher {
    fn name(&self) -> &'static str {
        "title"
    }

    fn find_candidates(&self, files: &[ScannedFile]) -> Vec<GroupCandidate> {
        let titles: Vec<String> = files.iter().map(canonical_title).collect();
        let mut assigned = vec![false; files.len()];
        let mut candidates = Vec::new();

        for i in 0..files.len() {
            if assigned[i] {
                continue;
            }
            let mut members = vec![i];
            assigned[i] = true;
            for j in (i + 1)..files.len() {
                if assigned[j] {
                    continue;
                }
                if self.similar(&titles[i], &titles[j]) {
                    members.push(j);
                    assigned[j] = true;
                }
            }
            candidates.push(GroupCandidate {
                key: format!("title:{}", titles[i]),
                members,
            });
        }
        candidates
    }
}

/// Groups files whose titles collapse to an identical fingerprint once
/// volatile release tokens (version, quality, release group) are stripped.
#[derive(Default)]
pub struct NormalizedHashMatcher;

impl NormalizedHashMatcher {
    fn fingerprint(file: &ScannedFile) -> String {
        canonical_title(file)
    }
}

impl Matcher for NormalizedHashMatcher {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn find_candidates(&self, files: &[ScannedFile]) -> Vec<GroupCandidate> {
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, file) in files.iter().enumerate() {
            buckets.entry(Self::fingerprint(file)).or_default().push(idx);
        }
        buckets
            .into_iter()
            .map(|(key, members)| GroupCandidate {
                key: format!("hash:{key}"),
                members,
            })
            .collect()
    }
}

/// Groups by `(normalized title, season)`. Files lacking both season and
/// episode data are singletons annotated as a fallback match.
#[derive(Default)]
pub struct SeasonEpisodeMatcher;

impl Matcher for SeasonEpisodeMatcher {
    fn name(&self) -> &'static str {
        "season"
    }

    fn find_candidates(&self, files: &[ScannedFile]) -> Vec<GroupCandidate> {
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, file) in files.iter().enumerate() {
            let key = match (file.parsed.season, file.parsed.episode) {
                (None, None) => format!("fallback:{idx}"),
                (season, _) => format!("{}:{}", canonical_title(file), season.unwrap_or(1)),
            };
            buckets.entry(key).or_default().push(idx);
        }
        buckets
            .into_iter()
            .map(|(key, members)| GroupCandidate {
                key: format!("season:{key}"),
                members,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anivault_model::scan::ParseResult;
    use chrono::Utc;

    fn file(title: &str, season: Option<u32>, episode: Option<u32>) -> ScannedFile {
        let mut parsed = ParseResult::empty(title);
        parsed.season = season;
        parsed.episode = episode;
        ScannedFile::new(format!("/{title}.mkv"), 10, parsed, Utc::now())
    }

    #[test]
    fn title_similarity_is_one_for_identical_strings() {
        assert_eq!(title_similarity("jujutsu kaisen", "jujutsu kaisen"), 1.0);
    }

    #[test]
    fn title_similarity_skips_wildly_different_lengths() {
        assert_eq!(title_similarity("a", "a very long and unrelated title here"), 0.0);
    }

    #[test]
    fn title_matcher_groups_near_identical_titles() {
        let files = vec![
            file("Jujutsu Kaisen", Some(1), Some(1)),
            file("Jujutsu Kaisen ", Some(1), Some(2)),
            file("Totally Different Show", Some(1), Some(1)),
        ];
        let matcher = TitleSimilarityMatcher::default();
        let candidates = matcher.find_candidates(&files);
        assert_eq!(candidates.len(), 2);
        let sizes: Vec<usize> = candidates.iter().map(|c| c.members.len()).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }

    #[test]
    fn season_matcher_isolates_files_without_season_or_episode() {
        let files = vec![file("Unparsed", None, None), file("Unparsed", None, None)];
        let matcher = SeasonEpisodeMatcher;
        let candidates = matcher.find_candidates(&files);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn hash_matcher_buckets_identical_fingerprints() {
        let files = vec![
            file("Jujutsu Kaisen", Some(1), Some(1)),
            file("Jujutsu Kaisen", Some(1), Some(2)),
        ];
        let matcher = NormalizedHashMatcher;
        let candidates = matcher.find_candidates(&files);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].members.len(), 2);
    }
}
