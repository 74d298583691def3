//! One module per `anivaultctl` subcommand, each a thin wrapper that wires
//! engine types together and prints a result; no decision logic lives here.

pub mod cache;
pub mod r#match;
pub mod organize;
pub mod rollback;
pub mod scan;

use std::sync::Arc;

use anivault_core::prelude::{ApiKey, CacheStore, EngineConfig, RateLimiter, RateLimiterConfig, TmdbClient};
use anivault_model::error::EngineResult;

/// Builds a TMDB client from engine config and a credential, sharing the
/// same rate-limiter construction every TMDB-backed subcommand needs.
pub(crate) async fn build_tmdb_client(
    config: &EngineConfig,
    api_key: ApiKey,
) -> EngineResult<Arc<TmdbClient>> {
    let cache = CacheStore::connect(&config.cache_db_path()).await?;
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        capacity: config.tmdb_rate_limit_rps,
        refill_rate: config.tmdb_rate_limit_rps,
        base_permits: config.tmdb_concurrent_requests,
        ..RateLimiterConfig::default()
    }));
    Ok(Arc::new(TmdbClient::new(
        config.tmdb_base_url.clone(),
        api_key,
        limiter,
        cache,
    )))
}
