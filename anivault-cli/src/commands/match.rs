use std::path::PathBuf;

use anivault_core::prelude::{EngineConfig, Enricher, EnricherConfig};
use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use anivault_model::group::Group;
use anivault_model::metadata::EnrichStatus;
use anivault_model::scan::{ParseResult, ScannedFile};
use chrono::Utc;

use super::build_tmdb_client;

pub async fn run(
    config: &EngineConfig,
    query: String,
    year: Option<i32>,
    series: bool,
) -> EngineResult<i32> {
    let api_key = config.tmdb_api_key.clone().ok_or_else(|| {
        EngineError::validation(
            ErrorContext::new("cli.match"),
            "TMDB_API_KEY is required for enrichment",
        )
    })?;

    let client = build_tmdb_client(config, api_key).await?;
    let enricher = Enricher::new(client, EnricherConfig::default());

    let mut parsed = ParseResult::empty(query.clone());
    parsed.title = query.clone();
    if series {
        parsed.season = Some(1);
        parsed.episode = Some(1);
    }
    if let Some(year) = year {
        parsed.other.insert("year".to_string(), year.to_string());
    }
    let file = ScannedFile::new(PathBuf::from(format!("{query}.mkv")), 0, parsed, Utc::now());
    let mut group = Group::new(query);
    group.files.push(file);

    let metadata = enricher.enrich_one(&group).await;
    let rendered = serde_json::to_string_pretty(&metadata).map_err(|e| {
        EngineError::validation(ErrorContext::new("cli.match"), format!("serialize result: {e}"))
    })?;
    println!("{rendered}");

    match metadata.status {
        EnrichStatus::Matched => Ok(0),
        EnrichStatus::LowConfidence => Ok(3),
        EnrichStatus::NotFound | EnrichStatus::Error => Ok(69),
    }
}
