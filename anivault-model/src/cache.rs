//! Cache store data model: `spec.md` §3 `CacheEntry`, §4.2.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cached remote response (`spec.md` §3 `CacheEntry`).
///
/// Invariants: `(cache_key, key_hash)` unique; `key_hash.len() == 64`;
/// `!cache_key.is_empty()`; `expires_at > created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    /// 64-character hex SHA-256 of `cache_key`.
    pub key_hash: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub payload_size: u64,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        // now == expires_at is treated as expired (spec.md §8 boundary case).
        now >= self.expires_at
    }
}

/// Aggregate counters returned by `cache.stats()` (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub total_bytes: u64,
    pub expired_count: u64,
    pub hits: u64,
    pub misses: u64,
}
