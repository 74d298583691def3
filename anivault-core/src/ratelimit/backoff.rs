//! `Retry-After` parsing and full-jitter backoff (`spec.md` §4.3).

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

const MIN_DELAY: Duration = Duration::from_secs(1);

/// Parses a `Retry-After` header value, accepting both the numeric-seconds
/// and HTTP-date forms, then applies the clock-skew guard: delays under 1s
/// are raised to 1s, delays over `max_cooldown` are capped.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>, max_cooldown: Duration) -> Duration {
    let raw = if let Ok(secs) = value.trim().parse::<u64>() {
        Duration::from_secs(secs)
    } else if let Ok(when) = DateTime::parse_from_rfc2822(value.trim()) {
        let when = when.with_timezone(&Utc);
        let delta = when.signed_duration_since(now);
        delta
            .to_std()
            .unwrap_or(Duration::ZERO)
    } else {
        return MIN_DELAY;
    };

    raw.clamp(MIN_DELAY, max_cooldown)
}

/// Full-jitter backoff: `uniform(0, min(30, 1.5 * 2^(attempt-1)))`,
/// attempts are 1-indexed.
pub fn full_jitter_backoff(attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let exp = 1.5 * 2f64.powi((attempt - 1) as i32);
    let ceiling = exp.min(30.0);
    let jittered = rand::rng().random_range(0.0..=ceiling);
    Duration::from_secs_f64(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_numeric_seconds() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let d = parse_retry_after("5", now, Duration::from_secs(300));
        assert_eq!(d, Duration::from_secs(5));
    }

    #[test]
    fn clamps_below_one_second() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let d = parse_retry_after("0", now, Duration::from_secs(300));
        assert_eq!(d, Duration::from_secs(1));
    }

    #[test]
    fn caps_at_max_cooldown() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let d = parse_retry_after("99999", now, Duration::from_secs(300));
        assert_eq!(d, Duration::from_secs(300));
    }

    #[test]
    fn falls_back_to_minimum_on_unparsable_value() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let d = parse_retry_after("not-a-date", now, Duration::from_secs(300));
        assert_eq!(d, Duration::from_secs(1));
    }

    #[test]
    fn full_jitter_backoff_never_exceeds_ceiling() {
        for attempt in 1..10 {
            let d = full_jitter_backoff(attempt);
            let ceiling = (1.5 * 2f64.powi((attempt - 1) as i32)).min(30.0);
            assert!(d.as_secs_f64() <= ceiling + f64::EPSILON);
        }
    }
}
