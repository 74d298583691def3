//! Typed TMDB v3 client built directly on `reqwest` (`spec.md` §4.4).
//!
//! Built directly on `reqwest` rather than a third-party TMDB SDK so the
//! rate-limit runtime and cache can intercept every call, the same pattern
//! a reqwest-backed reference client in the retrieval pack uses instead of
//! delegating to an opaque wrapper crate (see `DESIGN.md`).

mod dto;

use std::time::Duration;

use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use anivault_model::metadata::MediaKind;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::cache::{canonicalize, CacheStore};
use crate::config::ApiKey;
use crate::ratelimit::backoff;
use crate::ratelimit::{RateLimiter, ResponseOutcome};

const SEARCH_TTL_SECS: u64 = 24 * 3600;
const DETAILS_TTL_SECS: u64 = 14 * 24 * 3600;
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);
/// Upper bound on attempts for one logical call before `UpstreamRetryable`
/// is surfaced to the caller as `UpstreamError` (`spec.md` §7).
const MAX_REQUEST_ATTEMPTS: u32 = 4;
const RETRY_AFTER_CEILING: Duration = Duration::from_secs(300);

/// One search hit, mapped from either the TV or movie search endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TmdbCandidate {
    pub remote_id: i64,
    pub title: String,
    pub media_kind: MediaKind,
    pub year: Option<i32>,
    pub popularity: f64,
}

/// Canonical detail record for a TV series or movie.
#[derive(Debug, Clone, PartialEq)]
pub struct TmdbDetails {
    pub remote_id: i64,
    pub title: String,
    pub media_kind: MediaKind,
    pub first_air_date: Option<NaiveDate>,
    pub number_of_seasons: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TmdbEpisode {
    pub remote_id: i64,
    pub episode_number: u32,
    pub title: String,
    pub air_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TmdbSeason {
    pub remote_id: i64,
    pub season_number: u32,
    pub episodes: Vec<TmdbEpisode>,
}

/// Thin typed facade over the rate-limit runtime (`spec.md` §4.4).
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
    limiter: std::sync::Arc<RateLimiter>,
    cache: CacheStore,
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TmdbClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: ApiKey,
        limiter: std::sync::Arc<RateLimiter>,
        cache: CacheStore,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            limiter,
            cache,
        }
    }

    pub async fn search_tv(
        &self,
        query: &str,
        year: Option<i32>,
        language: &str,
    ) -> EngineResult<Vec<TmdbCandidate>> {
        let params = search_params(year, language);
        let key = canonicalize("search", "tv", query, &params);

        if let Some(cached) = self.cache.get(&key, "search").await? {
            return Ok(decode_candidates(cached)?);
        }

        let mut request_params = vec![("query".to_string(), query.to_string())];
        request_params.extend(params);
        let response: dto::SearchResponse<dto::TvSearchResult> = self
            .execute("/search/tv", &request_params, "tmdb.search_tv")
            .await?;

        let candidates: Vec<TmdbCandidate> = response
            .results
            .into_iter()
            .map(|r| TmdbCandidate {
                remote_id: r.id,
                title: r.name,
                media_kind: MediaKind::Tv,
                year: r.first_air_date.as_deref().and_then(year_from_date),
                popularity: r.popularity,
            })
            .collect();

        self.cache_candidates(&key, &candidates).await?;
        Ok(candidates)
    }

    pub async fn search_movie(
        &self,
        query: &str,
        year: Option<i32>,
        language: &str,
    ) -> EngineResult<Vec<TmdbCandidate>> {
        let params = search_params(year, language);
        let key = canonicalize("search", "movie", query, &params);

        if let Some(cached) = self.cache.get(&key, "search").await? {
            return Ok(decode_candidates(cached)?);
        }

        let mut request_params = vec![("query".to_string(), query.to_string())];
        request_params.extend(params);
        let response: dto::SearchResponse<dto::MovieSearchResult> = self
            .execute("/search/movie", &request_params, "tmdb.search_movie")
            .await?;

        let candidates: Vec<TmdbCandidate> = response
            .results
            .into_iter()
            .map(|r| TmdbCandidate {
                remote_id: r.id,
                title: r.title,
                media_kind: MediaKind::Movie,
                year: r.release_date.as_deref().and_then(year_from_date),
                popularity: r.popularity,
            })
            .collect();

        self.cache_candidates(&key, &candidates).await?;
        Ok(candidates)
    }

    pub async fn details(&self, kind: MediaKind, id: i64) -> EngineResult<TmdbDetails> {
        let key = canonicalize("details", media_kind_label(kind), &id.to_string(), &[]);
        if let Some(cached) = self.cache.get(&key, "details").await? {
            return decode_details(cached);
        }

        let details = match kind {
            MediaKind::Tv => {
                let path = format!("/tv/{id}");
                let dto: dto::TvDetails = self.execute(&path, &[], "tmdb.details").await?;
                TmdbDetails {
                    remote_id: dto.id,
                    title: dto.name,
                    media_kind: MediaKind::Tv,
                    first_air_date: dto.first_air_date.as_deref().and_then(parse_date),
                    number_of_seasons: dto.number_of_seasons,
                }
            }
            MediaKind::Movie => {
                let path = format!("/movie/{id}");
                let dto: dto::MovieDetails = self.execute(&path, &[], "tmdb.details").await?;
                TmdbDetails {
                    remote_id: dto.id,
                    title: dto.title,
                    media_kind: MediaKind::Movie,
                    first_air_date: dto.release_date.as_deref().and_then(parse_date),
                    number_of_seasons: None,
                }
            }
        };

        let payload = encode_details(&details)?;
        self.cache.put(&key, payload, "details", DETAILS_TTL_SECS).await?;
        Ok(details)
    }

    pub async fn season(&self, id: i64, season_no: u32) -> EngineResult<TmdbSeason> {
        let path = format!("/tv/{id}/season/{season_no}");
        let key = canonicalize("details", "season", &path, &[]);
        if let Some(cached) = self.cache.get(&key, "details").await? {
            return decode_season(cached);
        }

        let dto: dto::SeasonDetails = self.execute(&path, &[], "tmdb.season").await?;
        let season = TmdbSeason {
            remote_id: dto.id,
            season_number: dto.season_number,
            episodes: dto
                .episodes
                .into_iter()
                .map(|e| TmdbEpisode {
                    remote_id: e.id,
                    episode_number: e.episode_number,
                    title: e.name,
                    air_date: None,
                })
                .collect(),
        };

        let payload = encode_season(&season)?;
        self.cache.put(&key, payload, "details", DETAILS_TTL_SECS).await?;
        Ok(season)
    }

    pub async fn episode(&self, id: i64, season_no: u32, ep_no: u32) -> EngineResult<TmdbEpisode> {
        let path = format!("/tv/{id}/season/{season_no}/episode/{ep_no}");
        let key = canonicalize("details", "episode", &path, &[]);
        if let Some(cached) = self.cache.get(&key, "details").await? {
            return decode_episode(cached);
        }

        let dto: dto::EpisodeDetails = self.execute(&path, &[], "tmdb.episode").await?;
        let episode = TmdbEpisode {
            remote_id: dto.id,
            episode_number: dto.episode_number,
            title: dto.name,
            air_date: dto.air_date.as_deref().and_then(parse_date),
        };

        let payload = encode_episode(&episode)?;
        self.cache.put(&key, payload, "details", DETAILS_TTL_SECS).await?;
        Ok(episode)
    }

    async fn cache_candidates(&self, key: &str, candidates: &[TmdbCandidate]) -> EngineResult<()> {
        let payload = encode_candidates(candidates)?;
        self.cache.put(key, payload, "search", SEARCH_TTL_SECS).await
    }

    /// Runs one HTTP call through the rate-limit runtime: acquire, issue,
    /// record the outcome, and map non-2xx responses per `spec.md` §4.4's
    /// failure policy. Retries `UpstreamRetryable` failures (429, 5xx,
    /// network errors) up to `MAX_REQUEST_ATTEMPTS` times, sleeping for the
    /// server's `Retry-After` when present or a full-jitter backoff
    /// otherwise; `UpstreamRetryable` must never escape this function
    /// (`anivault-model/src/error.rs`'s doc comment on the variant).
    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        operation: &'static str,
    ) -> EngineResult<T> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.execute_once(path, params, operation).await {
                Ok(value) => return Ok(value),
                Err(RequestFailure::Fatal(err)) => return Err(err),
                Err(RequestFailure::Retryable { message, retry_after }) => {
                    if attempt >= MAX_REQUEST_ATTEMPTS {
                        return Err(EngineError::UpstreamError {
                            context: ErrorContext::new(operation),
                            status: 0,
                            body: format!(
                                "retries exhausted after {attempt} attempt(s): {message}"
                            ),
                        });
                    }
                    let delay = retry_after.unwrap_or_else(|| backoff::full_jitter_backoff(attempt));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Issues a single HTTP attempt through the rate-limit runtime.
    async fn execute_once<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        operation: &'static str,
    ) -> Result<T, RequestFailure> {
        let deadline = tokio::time::Instant::now() + REQUEST_DEADLINE;
        let _permit = self.limiter.acquire(deadline).await.map_err(RequestFailure::Fatal)?;

        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.get(&url).bearer_auth(self.api_key.expose());
        for (k, v) in params {
            request = request.query(&[(k.as_str(), v.as_str())]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                self.limiter
                    .record_outcome(ResponseOutcome::NetworkError, None)
                    .await;
                return Err(RequestFailure::Retryable {
                    message: err.to_string(),
                    retry_after: None,
                });
            }
        };

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let retry_after = retry_after_header
            .as_deref()
            .map(|header| backoff::parse_retry_after(header, Utc::now(), RETRY_AFTER_CEILING));

        if status.is_success() {
            self.limiter.record_outcome(ResponseOutcome::Success, None).await;
            let body = response
                .text()
                .await
                .map_err(|e| RequestFailure::Fatal(upstream_error(operation, status.as_u16(), e.to_string())))?;
            serde_json::from_str(&body)
                .map_err(|e| RequestFailure::Fatal(upstream_error(operation, status.as_u16(), e.to_string())))
        } else if status.as_u16() == 429 {
            self.limiter
                .record_outcome(ResponseOutcome::TooManyRequests, retry_after_header.as_deref())
                .await;
            let body = response.text().await.unwrap_or_default();
            Err(RequestFailure::Retryable {
                message: format!("429: {body}"),
                retry_after,
            })
        } else if status.is_server_error() {
            self.limiter.record_outcome(ResponseOutcome::ServerError, None).await;
            let body = response.text().await.unwrap_or_default();
            Err(RequestFailure::Retryable {
                message: format!("{status}: {body}"),
                retry_after,
            })
        } else {
            // Plain 4xx (not 429): fails this request only, FSM untouched.
            let body = response.text().await.unwrap_or_default();
            Err(RequestFailure::Fatal(upstream_error(operation, status.as_u16(), body)))
        }
    }
}

/// Outcome of one HTTP attempt inside [`TmdbClient::execute_once`]:
/// `Fatal` propagates immediately, `Retryable` feeds the backoff loop in
/// [`TmdbClient::execute`].
enum RequestFailure {
    Fatal(EngineError),
    Retryable {
        message: String,
        retry_after: Option<Duration>,
    },
}

fn upstream_error(operation: &'static str, status: u16, body: String) -> EngineError {
    EngineError::UpstreamError {
        context: ErrorContext::new(operation),
        status,
        body,
    }
}

fn search_params(year: Option<i32>, language: &str) -> Vec<(String, String)> {
    let mut params = vec![("language".to_string(), language.to_string())];
    if let Some(year) = year {
        params.push(("year".to_string(), year.to_string()));
    }
    params
}

fn media_kind_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Tv => "tv",
        MediaKind::Movie => "movie",
    }
}

fn year_from_date(date: &str) -> Option<i32> {
    date.get(0..4).and_then(|s| s.parse().ok())
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn encode_candidates(candidates: &[TmdbCandidate]) -> EngineResult<Value> {
    serde_json::to_value(
        candidates
            .iter()
            .map(|c| {
                serde_json::json!({
                    "remote_id": c.remote_id,
                    "title": c.title,
                    "media_kind": c.media_kind,
                    "year": c.year,
                    "popularity": c.popularity,
                })
            })
            .collect::<Vec<_>>(),
    )
    .map_err(|e| upstream_error("tmdb.encode", 0, e.to_string()))
}

fn decode_candidates(value: Value) -> EngineResult<Vec<TmdbCandidate>> {
    let raw: Vec<serde_json::Map<String, Value>> =
        serde_json::from_value(value).map_err(|e| upstream_error("tmdb.decode", 0, e.to_string()))?;
    raw.into_iter()
        .map(|entry| {
            let media_kind: MediaKind = serde_json::from_value(
                entry.get("media_kind").cloned().unwrap_or(Value::Null),
            )
            .map_err(|e| upstream_error("tmdb.decode", 0, e.to_string()))?;
            Ok(TmdbCandidate {
                remote_id: entry.get("remote_id").and_then(Value::as_i64).unwrap_or_default(),
                title: entry
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                media_kind,
                year: entry.get("year").and_then(Value::as_i64).map(|y| y as i32),
                popularity: entry.get("popularity").and_then(Value::as_f64).unwrap_or_default(),
            })
        })
        .collect()
}

fn encode_details(details: &TmdbDetails) -> EngineResult<Value> {
    serde_json::to_value(serde_json::json!({
        "remote_id": details.remote_id,
        "title": details.title,
        "media_kind": details.media_kind,
        "first_air_date": details.first_air_date,
        "number_of_seasons": details.number_of_seasons,
    }))
    .map_err(|e| upstream_error("tmdb.encode", 0, e.to_string()))
}

fn decode_details(value: Value) -> EngineResult<TmdbDetails> {
    let obj = value.as_object().cloned().unwrap_or_default();
    let media_kind: MediaKind = serde_json::from_value(obj.get("media_kind").cloned().unwrap_or(Value::Null))
        .map_err(|e| upstream_error("tmdb.decode", 0, e.to_string()))?;
    Ok(TmdbDetails {
        remote_id: obj.get("remote_id").and_then(Value::as_i64).unwrap_or_default(),
        title: obj.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
        media_kind,
        first_air_date: obj
            .get("first_air_date")
            .and_then(Value::as_str)
            .and_then(parse_date),
        number_of_seasons: obj.get("number_of_seasons").and_then(Value::as_u64).map(|n| n as u32),
    })
}

fn encode_season(season: &TmdbSeason) -> EngineResult<Value> {
    serde_json::to_value(serde_json::json!({
        "remote_id": season.remote_id,
        "season_number": season.season_number,
        "episodes": season.episodes.iter().map(|e| serde_json::json!({
            "remote_id": e.remote_id,
            "episode_number": e.episode_number,
            "title": e.title,
            "air_date": e.air_date,
        })).collect::<Vec<_>>(),
    }))
    .map_err(|e| upstream_error("tmdb.encode", 0, e.to_string()))
}

fn decode_season(value: Value) -> EngineResult<TmdbSeason> {
    let obj = value.as_object().cloned().unwrap_or_default();
    let episodes = obj
        .get("episodes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|e| TmdbEpisode {
            remote_id: e.get("remote_id").and_then(Value::as_i64).unwrap_or_default(),
            episode_number: e.get("episode_number").and_then(Value::as_u64).unwrap_or_default() as u32,
            title: e.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
            air_date: e.get("air_date").and_then(Value::as_str).and_then(parse_date),
        })
        .collect();
    Ok(TmdbSeason {
        remote_id: obj.get("remote_id").and_then(Value::as_i64).unwrap_or_default(),
        season_number: obj.get("season_number").and_then(Value::as_u64).unwrap_or_default() as u32,
        episodes,
    })
}

fn encode_episode(episode: &TmdbEpisode) -> EngineResult<Value> {
    serde_json::to_value(serde_json::json!({
        "remote_id": episode.remote_id,
        "episode_number": episode.episode_number,
        "title": episode.title,
        "air_date": episode.air_date,
    }))
    .map_err(|e| upstream_error("tmdb.encode", 0, e.to_string()))
}

fn decode_episode(value: Value) -> EngineResult<TmdbEpisode> {
    let obj = value.as_object().cloned().unwrap_or_default();
    Ok(TmdbEpisode {
        remote_id: obj.get("remote_id").and_then(Value::as_i64).unwrap_or_default(),
        episode_number: obj.get("episode_number").and_then(Value::as_u64).unwrap_or_default() as u32,
        title: obj.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
        air_date: obj.get("air_date").and_then(Value::as_str).and_then(parse_date),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_from_date_reads_leading_four_digits() {
        assert_eq!(year_from_date("2023-05-01"), Some(2023));
        assert_eq!(year_from_date(""), None);
    }

    #[test]
    fn candidate_round_trips_through_json_cache_encoding() {
        let candidates = vec![TmdbCandidate {
            remote_id: 95479,
            title: "Jujutsu Kaisen".to_string(),
            media_kind: MediaKind::Tv,
            year: Some(2020),
            popularity: 812.3,
        }];
        let encoded = encode_candidates(&candidates).unwrap();
        let decoded = decode_candidates(encoded).unwrap();
        assert_eq!(decoded, candidates);
    }
}
