//! Enrichment data model: `spec.md` §3 `EnrichedMetadata`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::group::ScoreResult;

/// The kind of media a group was matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Tv,
    Movie,
}

/// Outcome of enrichment for one group (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichStatus {
    Matched,
    LowConfidence,
    NotFound,
    Error,
}

/// Result of enrichment for one group (`spec.md` §3 `EnrichedMetadata`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMetadata {
    pub canonical_title: String,
    pub remote_id: Option<i64>,
    pub media_kind: Option<MediaKind>,
    pub first_air_date: Option<NaiveDate>,
    /// Per-scorer results, preserved for transparency.
    pub scores: Vec<ScoreResult>,
    /// Weighted aggregate in `[0, 1]`.
    pub overall_score: f32,
    pub status: EnrichStatus,
}

impl EnrichedMetadata {
    pub fn not_found(canonical_title: impl Into<String>) -> Self {
        Self {
            canonical_title: canonical_title.into(),
            remote_id: None,
            media_kind: None,
            first_air_date: None,
            scores: Vec::new(),
            overall_score: 0.0,
            status: EnrichStatus::NotFound,
        }
    }

    pub fn error(canonical_title: impl Into<String>) -> Self {
        Self {
            status: EnrichStatus::Error,
            ..Self::not_found(canonical_title)
        }
    }
}
