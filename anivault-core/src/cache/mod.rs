//! Persistent, content-addressed cache store (`spec.md` §4.2).
//!
//! Grounded on the teacher's use of `sqlx` for typed async relational
//! access (`ferrex-core::database`), swapped from Postgres to SQLite in WAL
//! mode since the cache is a single-host, content-addressed store rather
//! than a shared multi-tenant database.

mod canonical;

pub use canonical::{canonicalize, key_hash, looks_like_credential_leak};

use std::path::Path;
use std::str::FromStr;

use anivault_model::cache::{CacheEntry, CacheStats};
use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

fn storage_err(
    operation: &'static str,
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> EngineError {
    EngineError::storage_failure(
        ErrorContext::new(operation),
        message,
        Some(Box::new(source)),
    )
}

/// Handle to the on-disk cache database.
#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    /// Opens (creating if necessary) the cache database at `db_path`,
    /// enabling WAL journaling, and running pending migrations.
    pub async fn connect(db_path: &Path) -> EngineResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err("cache.connect", "create cache dir", e))?;
        }

        let connect_opts = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            db_path.display()
        ))
        .map_err(|e| storage_err("cache.connect", "parse cache db path", e))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(connect_opts)
            .await
            .map_err(|e| storage_err("cache.connect", "open cache db", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| storage_err("cache.connect", "run cache migrations", e))?;

        restrict_permissions(db_path);

        Ok(Self { pool })
    }

    /// Returns a cache store over an already-open pool, for tests.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads an unexpired entry, bumping hit count and last-accessed time.
    pub async fn get(&self, key: &str, category: &str) -> EngineResult<Option<Value>> {
        let hash = canonical::key_hash(key);
        let now = Utc::now();

        let row = sqlx::query(
            "SELECT payload, expires_at FROM cache WHERE key_hash = ?1 AND category = ?2",
        )
        .bind(&hash)
        .bind(category)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("cache.get", "query failed", e))?;

        let Some(row) = row else {
            self.record_miss().await?;
            return Ok(None);
        };

        let expires_at: Option<String> = row.try_get("expires_at").ok();
        if let Some(expires_at) = expires_at.as_deref() {
            let expires_at: DateTime<Utc> = expires_at
                .parse()
                .map_err(|e| storage_err("cache.get", "parse cache expiry", e))?;
            if now >= expires_at {
                self.record_miss().await?;
                return Ok(None);
            }
        }

        let payload_raw: String = row
            .try_get("payload")
            .map_err(|e| storage_err("cache.get", "read cache payload", e))?;
        let payload: Value = serde_json::from_str(&payload_raw)
            .map_err(|e| storage_err("cache.get", "decode cache payload", e))?;

        sqlx::query(
            "UPDATE cache SET hit_count = hit_count + 1, last_accessed_at = ?1 WHERE key_hash = ?2",
        )
        .bind(now.to_rfc3339())
        .bind(&hash)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("cache.get", "update cache hit counters", e))?;

        Ok(Some(payload))
    }

    /// Bumps the process-wide miss counter (`spec.md` §4.2 "hit/miss
    /// counters"); called for every `get()` that finds no live entry.
    async fn record_miss(&self) -> EngineResult<()> {
        sqlx::query("UPDATE cache_counters SET misses = misses + 1 WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("cache.get", "update miss counter", e))?;
        Ok(())
    }

    /// Inserts or replaces an entry, rejecting payloads that look like
    /// leaked credentials.
    pub async fn put(
        &self,
        key: &str,
        payload: Value,
        category: &str,
        ttl_seconds: u64,
    ) -> EngineResult<()> {
        if canonical::looks_like_credential_leak(&payload) {
            return Err(EngineError::policy_violation(
                ErrorContext::new("cache.put"),
                "payload resembles a leaked credential",
            ));
        }

        let hash = canonical::key_hash(key);
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(ttl_seconds as i64);
        let payload_raw = serde_json::to_string(&payload)
            .map_err(|e| storage_err("cache.put", "encode cache payload", e))?;
        let payload_size = payload_raw.len() as i64;

        sqlx::query(
            r#"
            INSERT INTO cache (cache_key, key_hash, category, payload, created_at, expires_at, payload_size)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(key_hash) DO UPDATE SET
                payload = excluded.payload,
                category = excluded.category,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                payload_size = excluded.payload_size
            "#,
        )
        .bind(key)
        .bind(&hash)
        .bind(category)
        .bind(&payload_raw)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .bind(payload_size)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("cache.put", "insert failed", e))?;

        Ok(())
    }

    /// Evicts all entries whose expiry has already passed.
    pub async fn purge_expired(&self) -> EngineResult<u64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("cache.purge_expired", "delete failed", e))?;
        Ok(result.rows_affected())
    }

    /// Evicts all entries, optionally scoped to one category.
    pub async fn purge(&self, category: Option<&str>) -> EngineResult<u64> {
        let result = match category {
            Some(category) => {
                sqlx::query("DELETE FROM cache WHERE category = ?1")
                    .bind(category)
                    .execute(&self.pool)
                    .await
            }
            None => sqlx::query("DELETE FROM cache").execute(&self.pool).await,
        }
        .map_err(|e| storage_err("cache.purge", "delete failed", e))?;
        Ok(result.rows_affected())
    }

    /// Aggregate counters (`spec.md` §4.2 `stats()`).
    pub async fn stats(&self) -> EngineResult<CacheStats> {
        let now = Utc::now().to_rfc3339();

        let totals = sqlx::query(
            "SELECT COUNT(*) AS entry_count, COALESCE(SUM(payload_size), 0) AS total_bytes, \
             COALESCE(SUM(hit_count), 0) AS hits FROM cache",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("cache.stats", "query failed", e))?;

        let expired: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cache WHERE expires_at IS NOT NULL AND expires_at <= ?1")
                .bind(&now)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| storage_err("cache.stats", "query expired count failed", e))?;

        let misses: i64 = sqlx::query_scalar("SELECT misses FROM cache_counters WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("cache.stats", "query miss counter failed", e))?
            .unwrap_or(0);

        Ok(CacheStats {
            entry_count: totals.try_get::<i64, _>("entry_count").unwrap_or(0) as u64,
            total_bytes: totals.try_get::<i64, _>("total_bytes").unwrap_or(0) as u64,
            expired_count: expired as u64,
            hits: totals.try_get::<i64, _>("hits").unwrap_or(0) as u64,
            misses: misses as u64,
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(db_path: &Path) {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(db_path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        let _ = fs::set_permissions(db_path, perms);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_db_path: &Path) {}

/// Rehydrates a [`CacheEntry`] model value; used by higher layers that want
/// the full record rather than just the payload (currently tests and the
/// `cache status` CLI path).
pub fn entry_from_row(
    cache_key: String,
    key_hash: String,
    category: String,
    subcategory: Option<String>,
    payload: Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    hit_count: u64,
    last_accessed_at: Option<DateTime<Utc>>,
    payload_size: u64,
) -> CacheEntry {
    CacheEntry {
        cache_key,
        key_hash,
        category,
        subcategory,
        payload,
        created_at,
        expires_at,
        hit_count,
        last_accessed_at,
        payload_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn in_memory_store() -> CacheStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        CacheStore::from_pool(pool)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = in_memory_store().await;
        store
            .put("jujutsu-kaisen", json!({"id": 95479}), "search", 3600)
            .await
            .unwrap();

        let hit = store.get("jujutsu-kaisen", "search").await.unwrap();
        assert_eq!(hit, Some(json!({"id": 95479})));
    }

    #[tokio::test]
    async fn rejects_credential_shaped_payload() {
        let store = in_memory_store().await;
        let result = store
            .put(
                "leaky",
                json!({"api_key": "abcdefghijklmnopqrstuvwx"}),
                "search",
                3600,
            )
            .await;
        assert!(matches!(result, Err(EngineError::PolicyViolation { .. })));
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let store = in_memory_store().await;
        store
            .put("stale", json!({"id": 1}), "search", 0)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let hit = store.get("stale", "search").await.unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn stats_counts_misses_separately_from_hits() {
        let store = in_memory_store().await;
        store.put("found", json!({"id": 1}), "search", 3600).await.unwrap();

        assert!(store.get("found", "search").await.unwrap().is_some());
        assert!(store.get("missing", "search").await.unwrap().is_none());
        assert!(store.get("missing", "search").await.unwrap().is_none());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn purge_expired_counts_evictions() {
        let store = in_memory_store().await;
        store.put("a", json!({"id": 1}), "search", 0).await.unwrap();
        store.put("b", json!({"id": 2}), "search", 3600).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let purged = store.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
    }
}
