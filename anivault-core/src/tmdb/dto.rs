//! Wire-format DTOs for the subset of the TMDB v3 API AniVault consumes.
//! Kept private to the client module and mapped into [`super::TmdbCandidate`]
//! / [`super::TmdbDetails`] at the boundary, the same discipline the teacher
//! applies between its provider wire types and its own domain types.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse<T> {
    pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TvSearchResult {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub popularity: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct MovieSearchResult {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub popularity: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct TvDetails {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub number_of_seasons: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MovieDetails {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SeasonDetails {
    pub id: i64,
    pub season_number: u32,
    #[serde(default)]
    pub episodes: Vec<EpisodeSummary>,
}

#[derive(Debug, Deserialize)]
pub(super) struct EpisodeSummary {
    pub id: i64,
    pub episode_number: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct EpisodeDetails {
    pub id: i64,
    pub episode_number: u32,
    pub name: String,
    #[serde(default)]
    pub air_date: Option<String>,
}
