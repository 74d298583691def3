//! Grouping engine orchestration (`spec.md` §4.6).
//!
//! Runs every registered [`Matcher`] independently, merges overlapping
//! candidates with union-find keyed on file identity (index into the input
//! slice), and records the winning matcher's contribution as
//! [`GroupingEvidence`].

pub mod duplicates;
pub mod matchers;

pub use matchers::{Matcher, TitleSimilarityMatcher, NormalizedHashMatcher, SeasonEpisodeMatcher};

use std::collections::HashMap;

use anivault_model::group::{Group, GroupingEvidence, ScoreResult};
use anivault_model::scan::ScannedFile;

/// Per-matcher weights used when scoring a merged group's winning matcher
/// (`spec.md` §4.6 defaults: title 0.6, hash 0.3, season 0.1).
#[derive(Debug, Clone)]
pub struct GroupingConfig {
    pub weights: HashMap<&'static str, f32>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert("title", 0.6);
        weights.insert("hash", 0.3);
        weights.insert("season", 0.1);
        Self { weights }
    }
}

impl GroupingConfig {
    fn weight_of(&self, matcher: &str) -> f32 {
        self.weights.get(matcher).copied().unwrap_or(0.0)
    }
}

/// Returns the default matcher stack (`spec.md` §4.6 concrete matchers).
pub fn default_matchers() -> Vec<Box<dyn Matcher>> {
    vec![
        Box::new(TitleSimilarityMatcher::default()),
        Box::new(NormalizedHashMatcher),
        Box::new(SeasonEpisodeMatcher),
    ]
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Clusters `files` into [`Group`]s using `matchers`, scoring each merged
/// cluster's evidence with `config`'s weights, then resolves duplicates
/// within every final group.
pub fn group_files(
    files: Vec<ScannedFile>,
    matchers: &[Box<dyn Matcher>],
    config: &GroupingConfig,
) -> Vec<Group> {
    if files.is_empty() {
        return Vec::new();
    }

    // matcher name -> file index -> (candidate key, candidate size)
    let mut per_matcher: HashMap<&'static str, HashMap<usize, (String, usize)>> = HashMap::new();
    let mut uf = UnionFind::new(files.len());

    for matcher in matchers {
        let candidates = matcher.find_candidates(&files);
        let mut index: HashMap<usize, (String, usize)> = HashMap::new();
        for candidate in &candidates {
            for &member in &candidate.members {
                index.insert(member, (candidate.key.clone(), candidate.members.len()));
            }
            for window in candidate.members.windows(2) {
                uf.union(window[0], window[1]);
            }
        }
        per_matcher.insert(matcher.name(), index);
    }

    let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..files.len() {
        let root = uf.find(idx);
        clusters.entry(root).or_default().push(idx);
    }

    let mut files: Vec<Option<ScannedFile>> = files.into_iter().map(Some).collect();
    let mut groups = Vec::with_capacity(clusters.len());

    for member_indices in clusters.into_values() {
        let evidence = build_evidence(&member_indices, &per_matcher, config);
        let canonical_title = pick_canonical_title(&member_indices, &files);

        let cluster_files: Vec<ScannedFile> = member_indices
            .iter()
            .map(|&idx| files[idx].take().expect("each index visited once"))
            .collect();

        let (representatives, losers) = duplicates::resolve(cluster_files);
        let mut group = Group::new(canonical_title);
        group.has_duplicates = !losers.is_empty();
        group.files = representatives;
        group.duplicate_losers = losers;
        group.evidence = Some(evidence);
        groups.push(group);
    }

    groups
}

fn pick_canonical_title(member_indices: &[usize], files: &[Option<ScannedFile>]) -> String {
    let mut counts: HashMap<String, (usize, String)> = HashMap::new();
    for &idx in member_indices {
        let file = files[idx].as_ref().expect("file present before resolve");
        let key = matchers::canonical_title(file);
        let entry = counts.entry(key).or_insert((0, file.parsed.title.clone()));
        entry.0 += 1;
    }
    counts
        .into_values()
        .max_by_key(|(count, _)| *count)
        .map(|(_, title)| title)
        .unwrap_or_default()
}

fn build_evidence(
    member_indices: &[usize],
    per_matcher: &HashMap<&'static str, HashMap<usize, (String, usize)>>,
    config: &GroupingConfig,
) -> GroupingEvidence {
    let group_len = member_indices.len();
    let mut scores = Vec::new();
    let mut winner: Option<(&'static str, f32, usize)> = None;

    let mut matcher_names: Vec<&'static str> = per_matcher.keys().copied().collect();
    // Deterministic tie-break order matching the default weight ranking.
    matcher_names.sort_by(|a, b| {
        config
            .weight_of(b)
            .partial_cmp(&config.weight_of(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for name in matcher_names {
        let index = &per_matcher[name];
        let contributed = largest_shared_cluster(member_indices, index);
        let weight = config.weight_of(name);
        let raw_score = if group_len == 0 {
            0.0
        } else {
            contributed as f32 / group_len as f32
        };
        let score = ScoreResult::new(
            name,
            raw_score,
            weight,
            format!("{name} matched {contributed}/{group_len} files"),
        );
        let weighted = score.weighted();
        scores.push(score);

        let better = match winner {
            None => true,
            Some((_, best_weighted, _)) => weighted > best_weighted,
        };
        if better {
            winner = Some((name, weighted, contributed));
        }
    }

    let (winner_name, winner_weighted, _) = winner.unwrap_or(("none", 0.0, 0));
    GroupingEvidence {
        matcher_scores: scores,
        selected_matcher: winner_name.to_string(),
        explanation: format!("{winner_name} contributed the strongest signal for this group"),
        aggregate_confidence: winner_weighted.clamp(0.0, 1.0),
    }
}

/// Largest subset of `member_indices` that one matcher placed in the same
/// candidate, used as that matcher's contribution count for this group.
fn largest_shared_cluster(member_indices: &[usize], index: &HashMap<usize, (String, usize)>) -> usize {
    let mut by_key: HashMap<&str, usize> = HashMap::new();
    for &idx in member_indices {
        if let Some((key, _)) = index.get(&idx) {
            *by_key.entry(key.as_str()).or_insert(0) += 1;
        }
    }
    by_key.into_values().max().unwrap_or(0)
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
        ScannedFile::new(format!("/{title}-{episode:?}.mkv"), 10, parsed, Utc::now())
    }

    #[test]
    fn groups_similar_titles_into_one_group() {
        let files = vec![
            file("Jujutsu Kaisen", Some(1), Some(1)),
            file("Jujutsu Kaisen", Some(1), Some(2)),
            file("Unrelated Show", Some(1), Some(1)),
        ];
        let groups = group_files(files, &default_matchers(), &GroupingConfig::default());
        assert_eq!(groups.len(), 2);
        let jjk = groups
            .iter()
            .find(|g| g.canonical_title == "Jujutsu Kaisen")
            .unwrap();
        assert_eq!(jjk.files.len(), 2);
        assert!(jjk.evidence.is_some());
        assert_eq!(jjk.evidence.as_ref().unwrap().selected_matcher, "title");
    }

    #[test]
    fn duplicate_episodes_are_resolved_within_a_group() {
        let mut a = file("Show", Some(1), Some(1));
        a.parsed.quality = Some("720p".to_string());
        let mut b = file("Show", Some(1), Some(1));
        b.parsed.quality = Some("1080p".to_string());
        let groups = group_files(vec![a, b], &default_matchers(), &GroupingConfig::default());
        assert_eq!(groups.len(), 1);
        assert!(groups[0].has_duplicates);
        assert_eq!(groups[0].files.len(), 1);
        assert_eq!(groups[0].duplicate_losers.len(), 1);
    }
}
