//! Rate-limit runtime data model: `spec.md` §3 `RateLimitState`, §4.3.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The TMDB client runtime's circuit-breaker state (`spec.md` §4.3).
///
/// Initial state is `Normal`; there is no terminal state, every transition
/// is reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitState {
    Normal,
    Throttle,
    Sleep,
    HalfOpen,
    CacheOnly,
}

impl Default for RateLimitState {
    fn default() -> Self {
        RateLimitState::Normal
    }
}

impl fmt::Display for RateLimitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateLimitState::Normal => "normal",
            RateLimitState::Throttle => "throttle",
            RateLimitState::Sleep => "sleep",
            RateLimitState::HalfOpen => "half_open",
            RateLimitState::CacheOnly => "cache_only",
        };
        write!(f, "{s}")
    }
}
