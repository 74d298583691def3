//! Scorer stack used to pick the best TMDB candidate for a group
//! (`spec.md` §4.7 step 3). Mirrors [`crate::grouping::Matcher`]'s shape:
//! a small object-safe trait so the orchestrator can run a heterogeneous
//! list without generics.

use anivault_model::error::EngineResult;
use anivault_model::group::{Group, ScoreResult};

use crate::grouping::matchers::title_similarity;
use crate::tmdb::TmdbCandidate;

/// Scores one TMDB candidate against a group along a single dimension.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f32;
    fn score(&self, group: &Group, candidate: &TmdbCandidate) -> EngineResult<ScoreResult>;
}

/// Fuzzy title match on normalized titles (`spec.md` §4.7, weight 0.6).
pub struct TitleScorer;

impl Scorer for TitleScorer {
    fn name(&self) -> &'static str {
        "title"
    }

    fn weight(&self) -> f32 {
        0.6
    }

    fn score(&self, group: &Group, candidate: &TmdbCandidate) -> EngineResult<ScoreResult> {
        let a = group.canonical_title.to_lowercase();
        let b = candidate.title.to_lowercase();
        let similarity = title_similarity(&a, &b) as f32;
        Ok(ScoreResult::new(
            self.name(),
            similarity,
            self.weight(),
            format!("fuzzy ratio {similarity:.2} between \"{a}\" and \"{b}\""),
        ))
    }
}

/// Exact/near-match year comparison (`spec.md` §4.7, weight 0.3).
pub struct YearScorer;

impl Scorer for YearScorer {
    fn name(&self) -> &'static str {
        "year"
    }

    fn weight(&self) -> f32 {
        0.3
    }

    fn score(&self, group: &Group, candidate: &TmdbCandidate) -> EngineResult<ScoreResult> {
        let group_year = group
            .files
            .iter()
            .find_map(|f| f.parsed.other.get("year").and_then(|y| y.parse::<i32>().ok()));

        let (raw_score, reason) = match (group_year, candidate.year) {
            (Some(g), Some(c)) => {
                let delta = (g - c).abs();
                let score = match delta {
                    0 => 1.0,
                    1 => 0.8,
                    2 => 0.5,
                    _ => 0.0,
                };
                (score, format!("group year {g} vs candidate year {c} (delta {delta})"))
            }
            _ => (0.0, "no year available on one side".to_string()),
        };

        Ok(ScoreResult::new(self.name(), raw_score, self.weight(), reason))
    }
}

/// Whether the group's season/episode evidence matches the candidate's
/// media kind (`spec.md` §4.7, weight 0.1).
pub struct MediaTypeScorer;

impl Scorer for MediaTypeScorer {
    fn name(&self) -> &'static str {
        "media_type"
    }

    fn weight(&self) -> f32 {
        0.1
    }

    fn score(&self, group: &Group, candidate: &TmdbCandidate) -> EngineResult<ScoreResult> {
        use anivault_model::metadata::MediaKind;

        let looks_like_series = group
            .files
            .iter()
            .any(|f| f.parsed.season.is_some() || f.parsed.episode.is_some());
        let expected = if looks_like_series {
            MediaKind::Tv
        } else {
            MediaKind::Movie
        };

        let raw_score = if expected == candidate.media_kind { 1.0 } else { 0.0 };
        Ok(ScoreResult::new(
            self.name(),
            raw_score,
            self.weight(),
            format!("expected {expected:?}, candidate is {:?}", candidate.media_kind),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anivault_model::metadata::MediaKind;
    use anivault_model::scan::ParseResult;
    use chrono::Utc;

    fn group_with(title: &str, season: Option<u32>, year: Option<&str>) -> Group {
        let mut parsed = ParseResult::empty(title);
        parsed.season = season;
        if let Some(year) = year {
            parsed.other.insert("year".to_string(), year.to_string());
        }
        let mut group = Group::new(title);
        group.files = vec![anivault_model::scan::ScannedFile::new(
            format!("/{title}.mkv"),
            10,
            parsed,
            Utc::now(),
        )];
        group
    }

    fn candidate(title: &str, year: Option<i32>, kind: MediaKind) -> TmdbCandidate {
        TmdbCandidate {
            remote_id: 1,
            title: title.to_string(),
            media_kind: kind,
            year,
            popularity: 1.0,
        }
    }

    #[test]
    fn title_scorer_rewards_exact_match() {
        let group = group_with("Jujutsu Kaisen", Some(1), None);
        let candidate = candidate("Jujutsu Kaisen", None, MediaKind::Tv);
        let result = TitleScorer.score(&group, &candidate).unwrap();
        assert_eq!(result.raw_score, 1.0);
    }

    #[test]
    fn year_scorer_handles_exact_and_missing_years() {
        let group = group_with("Show", None, Some("2020"));
        let exact = candidate("Show", Some(2020), MediaKind::Tv);
        assert_eq!(YearScorer.score(&group, &exact).unwrap().raw_score, 1.0);

        let missing = candidate("Show", None, MediaKind::Tv);
        assert_eq!(YearScorer.score(&group, &missing).unwrap().raw_score, 0.0);
    }

    #[test]
    fn media_type_scorer_matches_series_evidence() {
        let group = group_with("Show", Some(1), None);
        let tv = candidate("Show", None, MediaKind::Tv);
        let movie = candidate("Show", None, MediaKind::Movie);
        assert_eq!(MediaTypeScorer.score(&group, &tv).unwrap().raw_score, 1.0);
        assert_eq!(MediaTypeScorer.score(&group, &movie).unwrap().raw_score, 0.0);
    }
}
