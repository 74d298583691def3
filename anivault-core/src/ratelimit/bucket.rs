//! Continuous token bucket (`spec.md` §4.3).

use tokio::time::Instant;

/// Tokens accumulate continuously between requests rather than on a fixed
/// clock tick, so bursts after an idle period see the full bucket rather
/// than whatever a tick-based scheduler happened to credit.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refills based on elapsed time, then deducts one token if available.
    /// Returns `true` when a token was consumed.
    pub fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Empties the bucket immediately, used when a 429 is observed.
    pub fn reset_empty(&mut self) {
        self.refill();
        self.tokens = 0.0;
    }

    /// Reconfigures capacity/rate in place (state entry actions change
    /// these without discarding accumulated tokens).
    pub fn reconfigure(&mut self, capacity: f64, refill_rate: f64) {
        self.refill();
        self.capacity = capacity;
        self.refill_rate = refill_rate;
        self.tokens = self.tokens.min(capacity);
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn consumes_down_to_zero_then_refuses() {
        let mut bucket = TokenBucket::new(2.0, 1.0);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[tokio::test(start_paused = true)]
    async fn refills_continuously_over_elapsed_time() {
        let mut bucket = TokenBucket::new(5.0, 5.0);
        for _ in 0..5 {
            assert!(bucket.try_consume());
        }
        assert!(!bucket.try_consume());

        tokio::time::advance(std::time::Duration::from_millis(400)).await;
        assert!(bucket.try_consume());
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_capacity() {
        let mut bucket = TokenBucket::new(3.0, 100.0);
        tokio::time::advance(std::time::Duration::from_secs(10)).await;
        bucket.refill();
        assert_eq!(bucket.tokens(), 3.0);
    }
}
