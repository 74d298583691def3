//! Grouping engine data model: `spec.md` §3 `Group`, `GroupingEvidence`,
//! `ScoreResult`.

use serde::{Deserialize, Serialize};

use crate::ids::GroupId;
use crate::scan::ScannedFile;

/// Output of one scorer (matcher or enrichment scorer) on one candidate.
///
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub component: String,
    /// Raw score in `[0, 1]`.
    pub raw_score: f32,
    /// Weight in `[0, 1]`.
    pub weight: f32,
    pub reason: String,
}

impl ScoreResult {
    pub fn new(
        component: impl Into<String>,
        raw_score: f32,
        weight: f32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            raw_score: raw_score.clamp(0.0, 1.0),
            weight: weight.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    pub fn weighted(&self) -> f32 {
        self.raw_score * self.weight
    }
}

/// Provenance record for one grouping decision (`spec.md` §3
/// `GroupingEvidence`). Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingEvidence {
    /// Per-matcher scores that contributed to this group.
    pub matcher_scores: Vec<ScoreResult>,
    /// The matcher whose score decided membership.
    pub selected_matcher: String,
    pub explanation: String,
    /// Aggregate confidence in `[0, 1]` — the winner's weighted score.
    pub aggregate_confidence: f32,
}

/// A cluster of [`ScannedFile`]s believed to be the same logical work
/// (`spec.md` §3 `Group`).
///
/// After duplicate resolution every group contains exactly one
/// representative per `(title, season, episode)` tuple; files excluded as
/// duplicate losers are tracked separately in `duplicate_losers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub canonical_title: String,
    /// Representative files, ordered by `(season, episode, path)`.
    pub files: Vec<ScannedFile>,
    /// Files excluded by duplicate resolution, alongside the representative
    /// that won their `(season, episode)` slot.
    pub duplicate_losers: Vec<ScannedFile>,
    pub evidence: Option<GroupingEvidence>,
    pub has_duplicates: bool,
}

impl Group {
    pub fn new(canonical_title: impl Into<String>) -> Self {
        Self {
            id: GroupId::new_v4(),
            canonical_title: canonical_title.into(),
            files: Vec::new(),
            duplicate_losers: Vec::new(),
            evidence: None,
            has_duplicates: false,
        }
    }
}
