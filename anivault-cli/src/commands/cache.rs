use anivault_core::prelude::{CacheStore, EngineConfig};
use anivault_model::error::{EngineError, EngineResult, ErrorContext};

pub async fn status(config: &EngineConfig) -> EngineResult<i32> {
    let cache = CacheStore::connect(&config.cache_db_path()).await?;
    let stats = cache.stats().await?;
    let rendered = serde_json::to_string_pretty(&stats).map_err(|e| {
        EngineError::validation(ErrorContext::new("cli.cache.status"), format!("serialize stats: {e}"))
    })?;
    println!("{rendered}");
    Ok(0)
}

pub async fn clear(config: &EngineConfig, category: Option<String>) -> EngineResult<i32> {
    let cache = CacheStore::connect(&config.cache_db_path()).await?;
    let purged = cache.purge(category.as_deref()).await?;
    println!("purged {purged} entry/entries");
    Ok(0)
}
