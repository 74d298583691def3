//! Metadata enricher: selects the best remote TMDB match for a group
//! (`spec.md` §4.7).

mod scorers;

pub use scorers::{MediaTypeScorer, Scorer, TitleScorer, YearScorer};

use std::sync::Arc;

use anivault_model::error::EngineResult;
use anivault_model::group::{Group, ScoreResult};
use anivault_model::metadata::{EnrichStatus, EnrichedMetadata};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::tmdb::{TmdbCandidate, TmdbClient};

const ACCEPTANCE_THRESHOLD: f32 = 0.7;
const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone)]
pub struct EnricherConfig {
    pub language: String,
    /// Caller-side concurrency bound on groups enriched at once. This never
    /// bypasses the TMDB client's own rate-limit semaphore, which remains
    /// authoritative (`spec.md` §4.7 batching note).
    pub concurrency: usize,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

pub struct Enricher {
    client: Arc<TmdbClient>,
    scorers: Arc<Vec<Box<dyn Scorer>>>,
    config: EnricherConfig,
    gate: Arc<Semaphore>,
}

impl Enricher {
    pub fn new(client: Arc<TmdbClient>, config: EnricherConfig) -> Self {
        let gate = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            client,
            scorers: Arc::new(default_scorers()),
            config,
            gate,
        }
    }

    /// Enriches every group concurrently, bounded by `config.concurrency`.
    /// This bound composes with, but never bypasses, the TMDB client's own
    /// rate-limit semaphore (`spec.md` §4.7).
    pub async fn enrich_all(&self, groups: &[Group]) -> Vec<EnrichedMetadata> {
        let mut tasks = Vec::with_capacity(groups.len());
        for group in groups.iter().cloned() {
            let gate = self.gate.clone();
            let client = self.client.clone();
            let scorers = self.scorers.clone();
            let language = self.config.language.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = gate.acquire_owned().await;
                let scorer_refs: Vec<&dyn Scorer> = scorers.iter().map(|s| s.as_ref()).collect();
                enrich_one(&client, &language, &group, &scorer_refs).await
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(metadata) => results.push(metadata),
                Err(err) => {
                    warn!(error = %err, "enrich: worker task panicked");
                }
            }
        }
        results
    }

    pub async fn enrich_one(&self, group: &Group) -> EnrichedMetadata {
        let _permit = self.gate.clone().acquire_owned().await;
        let scorers: Vec<&dyn Scorer> = self.scorers.iter().map(|s| s.as_ref()).collect();
        enrich_one(&self.client, &self.config.language, group, &scorers).await
    }
}

fn default_scorers() -> Vec<Box<dyn Scorer>> {
    vec![
        Box::new(TitleScorer),
        Box::new(YearScorer),
        Box::new(MediaTypeScorer),
    ]
}

fn has_season_or_episode(group: &Group) -> bool {
    group
        .files
        .iter()
        .any(|f| f.parsed.season.is_some() || f.parsed.episode.is_some())
}

fn majority_year(group: &Group) -> Option<i32> {
    use std::collections::HashMap;
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for file in &group.files {
        if let Some(year) = file.parsed.other.get("year").and_then(|y| y.parse::<i32>().ok()) {
            *counts.entry(year).or_insert(0) += 1;
        }
    }
    counts.into_iter().max_by_key(|(_, c)| *c).map(|(y, _)| y)
}

async fn enrich_one(
    client: &TmdbClient,
    language: &str,
    group: &Group,
    scorers: &[&dyn Scorer],
) -> EnrichedMetadata {
    let query = strip_diacritics_lower(&group.canonical_title);
    let year = majority_year(group);
    let is_series = has_season_or_episode(group);

    let mut candidates: Vec<TmdbCandidate> = Vec::new();
    match fetch_candidates(client, &query, year, language, is_series).await {
        Ok(found) => candidates = found,
        // `spec.md` §4.7: a cache miss while the rate-limit runtime is
        // `Sleep` or `CacheOnly` resolves as not-found, not an error —
        // the network is deliberately never consulted in that state.
        Err(anivault_model::error::EngineError::Blocked { .. }) => {
            return EnrichedMetadata::not_found(group.canonical_title.clone());
        }
        Err(err) => {
            warn!(group = %group.canonical_title, error = %err, "enrich: search failed");
            return EnrichedMetadata::error(group.canonical_title.clone());
        }
    }

    if candidates.is_empty() {
        return EnrichedMetadata::not_found(group.canonical_title.clone());
    }

    let mut best: Option<(TmdbCandidate, f32, Vec<ScoreResult>)> = None;
    for candidate in candidates {
        let mut scores = Vec::with_capacity(scorers.len());
        let mut aggregate = 0.0f32;
        for scorer in scorers {
            let result = match scorer.score(group, &candidate) {
                Ok(result) => result,
                Err(err) => {
                    warn!(scorer = scorer.name(), error = %err, "enrich: scorer failed, treating as zero");
                    ScoreResult::new(scorer.name(), 0.0, scorer.weight(), "scorer error")
                }
            };
            aggregate += result.weighted();
            scores.push(result);
        }
        let is_better = match &best {
            None => true,
            Some((_, best_score, _)) => aggregate > *best_score,
        };
        if is_better {
            best = Some((candidate, aggregate, scores));
        }
    }

    let Some((candidate, aggregate, scores)) = best else {
        return EnrichedMetadata::not_found(group.canonical_title.clone());
    };

    if aggregate < ACCEPTANCE_THRESHOLD {
        return EnrichedMetadata {
            canonical_title: group.canonical_title.clone(),
            remote_id: Some(candidate.remote_id),
            media_kind: Some(candidate.media_kind),
            first_air_date: None,
            scores,
            overall_score: aggregate,
            status: EnrichStatus::LowConfidence,
        };
    }

    let first_air_date = match client.details(candidate.media_kind, candidate.remote_id).await {
        Ok(details) => details.first_air_date,
        Err(err) => {
            warn!(group = %group.canonical_title, error = %err, "enrich: details call failed");
            None
        }
    };

    EnrichedMetadata {
        canonical_title: group.canonical_title.clone(),
        remote_id: Some(candidate.remote_id),
        media_kind: Some(candidate.media_kind),
        first_air_date,
        scores,
        overall_score: aggregate,
        status: EnrichStatus::Matched,
    }
}

async fn fetch_candidates(
    client: &TmdbClient,
    query: &str,
    year: Option<i32>,
    language: &str,
    is_series: bool,
) -> EngineResult<Vec<TmdbCandidate>> {
    if is_series {
        client.search_tv(query, year, language).await
    } else {
        let mut candidates = client.search_tv(query, year, language).await?;
        candidates.extend(client.search_movie(query, year, language).await?);
        Ok(candidates)
    }
}

fn strip_diacritics_lower(title: &str) -> String {
    crate::cache::canonicalize("query", "", title, &[])
        .split('\u{1f}')
        .last()
        .unwrap_or(title)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_diacritics_lower_normalizes_case_and_accents() {
        assert_eq!(strip_diacritics_lower("Attaque des Titans"), "attaque des titans");
    }
}
