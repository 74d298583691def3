//! Environment-driven engine configuration (`spec.md` §6 env vars).
//!
//! Loaded once at startup by the caller (typically `anivaultctl`) and passed
//! by reference into the components that need it — no global mutable
//! singleton, per `spec.md` §9's redesign note on ambient config/logger
//! singletons.

use std::path::PathBuf;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// TMDB API key, zeroized on drop so it never lingers in process memory
/// longer than necessary (mirrors the teacher's use of `zeroize` for
/// credential material).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Engine-wide configuration assembled from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `TMDB_API_KEY` — required for enrichment.
    pub tmdb_api_key: Option<ApiKey>,
    /// `TMDB_BASE_URL` — default `https://api.themoviedb.org/3`.
    pub tmdb_base_url: String,
    /// `TMDB_RATE_LIMIT_RPS` — default 35.
    pub tmdb_rate_limit_rps: f64,
    /// `TMDB_CONCURRENT_REQUESTS` — default 4.
    pub tmdb_concurrent_requests: usize,
    /// `ANIVAULT_CACHE_DIR` — default `~/.cache/anivault`.
    pub cache_dir: PathBuf,
    /// `ANIVAULT_CACHE_TTL_HOURS` — default 24.
    pub cache_ttl_hours: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_base_url: "https://api.themoviedb.org/3".to_string(),
            tmdb_rate_limit_rps: 35.0,
            tmdb_concurrent_requests: 4,
            cache_dir: default_cache_dir(),
            cache_ttl_hours: 24,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache")
        .join("anivault")
}

impl EngineConfig {
    /// Loads configuration from environment variables, falling back to
    /// documented defaults for anything unset (`spec.md` §6).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("TMDB_API_KEY") {
            if !key.is_empty() {
                config.tmdb_api_key = Some(ApiKey::new(key));
            }
        }
        if let Ok(url) = std::env::var("TMDB_BASE_URL") {
            config.tmdb_base_url = url;
        }
        if let Ok(rps) = std::env::var("TMDB_RATE_LIMIT_RPS") {
            if let Ok(parsed) = rps.parse() {
                config.tmdb_rate_limit_rps = parsed;
            }
        }
        if let Ok(n) = std::env::var("TMDB_CONCURRENT_REQUESTS") {
            if let Ok(parsed) = n.parse() {
                config.tmdb_concurrent_requests = parsed;
            }
        }
        if let Ok(dir) = std::env::var("ANIVAULT_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(ttl) = std::env::var("ANIVAULT_CACHE_TTL_HOURS") {
            if let Ok(parsed) = ttl.parse() {
                config.cache_ttl_hours = parsed;
            }
        }

        config
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.cache_dir.join("cache.db")
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.cache_dir.join("journal")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.cache_dir.join("plans")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.tmdb_base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.tmdb_rate_limit_rps, 35.0);
        assert_eq!(config.tmdb_concurrent_requests, 4);
        assert_eq!(config.cache_ttl_hours, 24);
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret-value");
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");
    }
}
