//! TMDB rate-limit runtime: token bucket, concurrency semaphore, and
//! five-state circuit breaker (`spec.md` §4.3).
//!
//! All mutable state lives behind one `tokio::sync::Mutex`-guarded [`Inner`]
//! per `spec.md` §5's single-mutex requirement. A [`RateLimiterObserver`]
//! hook lets tests assert on FSM transitions without real sleeps, the same
//! trait-for-testability pattern the teacher applies to its `FileSystem`
//! abstraction (see [`crate::fs`]).

pub mod backoff;
mod bucket;
mod window;

pub use window::ResponseOutcome;

use std::sync::Arc;
use std::time::Duration;

use anivault_model::error::{BlockedState, EngineError, EngineResult, ErrorContext};
use anivault_model::rate_limit::RateLimitState;
use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

use bucket::TokenBucket;
use window::SlidingWindow;

/// Observes confirmed FSM transitions. The default is a no-op; tests
/// install a recording observer to assert on the sequence of states
/// without needing real sleeps.
pub trait RateLimiterObserver: Send + Sync {
    fn on_transition(&self, _from: RateLimitState, _to: RateLimitState) {}
}

#[derive(Debug, Default)]
struct NoopObserver;
impl RateLimiterObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub capacity: f64,
    pub refill_rate: f64,
    pub base_permits: usize,
    pub semaphore_timeout: Duration,
    pub min_cooldown: Duration,
    pub max_cooldown: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 35.0,
            refill_rate: 35.0,
            base_permits: 4,
            semaphore_timeout: Duration::from_secs(30),
            min_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    NormalToThrottle,
    ThrottleToHalfOpen,
    ThrottleToSleep,
    HalfOpenToNormal,
}

struct Inner {
    state: RateLimitState,
    bucket: TokenBucket,
    window: SlidingWindow,
    semaphore: Arc<Semaphore>,
    consecutive_429: u32,
    successes_in_state: u32,
    pending_trigger: Option<Trigger>,
    sleep_until: Option<Instant>,
    cooldown: Duration,
}

/// Guard returned by [`RateLimiter::acquire`]. Dropping it releases the
/// semaphore permit on every exit path, including panics.
pub struct RateLimitPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// TMDB rate-limit runtime.
pub struct RateLimiter {
    inner: Mutex<Inner>,
    config: RateLimiterConfig,
    observer: Arc<dyn RateLimiterObserver>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    pub fn with_observer(config: RateLimiterConfig, observer: Arc<dyn RateLimiterObserver>) -> Self {
        let bucket = TokenBucket::new(config.capacity, config.refill_rate);
        let semaphore = Arc::new(Semaphore::new(config.base_permits));
        Self {
            inner: Mutex::new(Inner {
                state: RateLimitState::Normal,
                bucket,
                window: SlidingWindow::new(),
                semaphore,
                consecutive_429: 0,
                successes_in_state: 0,
                pending_trigger: None,
                sleep_until: None,
                cooldown: config.min_cooldown,
            }),
            config,
            observer,
        }
    }

    pub async fn state(&self) -> RateLimitState {
        self.inner.lock().await.state
    }

    /// Manually forces `CacheOnly` mode, per the spec's manual-exit path.
    pub async fn enter_cache_only(&self) {
        let mut inner = self.inner.lock().await;
        let from = inner.state;
        inner.state = RateLimitState::CacheOnly;
        drop(inner);
        self.observer.on_transition(from, RateLimitState::CacheOnly);
    }

    /// Manually exits `CacheOnly`, entering `Sleep` to re-validate upstream
    /// health before resuming normal traffic.
    pub async fn exit_cache_only(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != RateLimitState::CacheOnly {
            return;
        }
        let cooldown = inner.cooldown;
        self.transition(&mut inner, RateLimitState::Sleep, Some(cooldown));
    }

    /// Runs the acquisition phase of the request lifecycle (`spec.md` §4.3
    /// steps 1-4): blocked-state check, semaphore acquisition, token
    /// consumption. Returns a permit that must be held for the duration of
    /// the HTTP call and dropped afterward.
    pub async fn acquire(&self, deadline: Instant) -> EngineResult<RateLimitPermit> {
        let semaphore = {
            let mut inner = self.inner.lock().await;
            self.reconcile_sleep_timer(&mut inner);

            match inner.state {
                RateLimitState::Sleep => {
                    let eta = inner
                        .sleep_until
                        .map(|t| t.saturating_duration_since(Instant::now()).as_secs())
                        .unwrap_or(0);
                    return Err(EngineError::Blocked {
                        context: ErrorContext::new("ratelimit.acquire"),
                        state: BlockedState::Sleep,
                        eta_secs: eta,
                    });
                }
                RateLimitState::CacheOnly => {
                    return Err(EngineError::Blocked {
                        context: ErrorContext::new("ratelimit.acquire"),
                        state: BlockedState::CacheOnly,
                        eta_secs: 0,
                    });
                }
                _ => {}
            }

            inner.semaphore.clone()
        };

        let timeout = deadline.saturating_duration_since(Instant::now());
        let permit = tokio::time::timeout(timeout, semaphore.acquire_owned())
            .await
            .map_err(|_| EngineError::Cancellation {
                context: ErrorContext::new("ratelimit.acquire.semaphore"),
            })?
            .map_err(|_| EngineError::Cancellation {
                context: ErrorContext::new("ratelimit.acquire.semaphore_closed"),
            })?;

        self.await_token(deadline).await?;

        Ok(RateLimitPermit { _permit: permit })
    }

    async fn await_token(&self, deadline: Instant) -> EngineResult<()> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if inner.bucket.try_consume() {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(EngineError::Cancellation {
                    context: ErrorContext::new("ratelimit.acquire.token"),
                });
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn reconcile_sleep_timer(&self, inner: &mut Inner) {
        if inner.state == RateLimitState::Sleep {
            if let Some(wake_at) = inner.sleep_until {
                if Instant::now() >= wake_at {
                    self.transition(inner, RateLimitState::HalfOpen, None);
                }
            }
        }
    }

    /// Records the outcome of a completed request and drives the FSM
    /// (`spec.md` §4.3 steps 6-8).
    pub async fn record_outcome(&self, outcome: ResponseOutcome, retry_after_header: Option<&str>) {
        let mut inner = self.inner.lock().await;
        inner.window.push(outcome);

        match outcome {
            ResponseOutcome::Success => {
                inner.consecutive_429 = 0;
                inner.successes_in_state += 1;
            }
            ResponseOutcome::TooManyRequests => {
                inner.consecutive_429 += 1;
                inner.successes_in_state = 0;
                inner.bucket.reset_empty();
                if let Some(header) = retry_after_header {
                    let delay = backoff::parse_retry_after(header, Utc::now(), self.config.max_cooldown);
                    inner.cooldown = delay.max(self.config.min_cooldown);
                }
            }
            ResponseOutcome::ServerError | ResponseOutcome::NetworkError => {
                inner.consecutive_429 = 0;
                inner.successes_in_state = 0;
            }
        }

        if inner.state == RateLimitState::HalfOpen && outcome != ResponseOutcome::Success {
            let cooldown = inner.cooldown * 2;
            inner.cooldown = cooldown;
            self.transition(&mut inner, RateLimitState::Sleep, Some(cooldown));
            return;
        }

        match candidate_trigger(&inner) {
            Some(trigger) if inner.pending_trigger == Some(trigger) => {
                inner.pending_trigger = None;
                let (target, sleep_for) = resolve_trigger(trigger, inner.cooldown);
                self.transition(&mut inner, target, sleep_for);
            }
            Some(trigger) => inner.pending_trigger = Some(trigger),
            None => inner.pending_trigger = None,
        }
    }

    fn transition(&self, inner: &mut Inner, target: RateLimitState, sleep_for: Option<Duration>) {
        let from = inner.state;
        if from == target {
            return;
        }
        inner.state = target;
        inner.successes_in_state = 0;
        inner.pending_trigger = None;

        match target {
            RateLimitState::Normal => {
                inner.bucket.reconfigure(self.config.capacity, self.config.refill_rate);
                resize_semaphore(&mut inner.semaphore, self.config.base_permits);
                inner.sleep_until = None;
            }
            RateLimitState::Throttle => {
                let rate = (self.config.refill_rate / 2.0).max(5.0);
                inner.bucket.reconfigure(self.config.capacity, rate);
                let permits = (self.config.base_permits / 2).max(1);
                resize_semaphore(&mut inner.semaphore, permits);
            }
            RateLimitState::Sleep => {
                let cooldown = sleep_for.unwrap_or(self.config.min_cooldown).max(self.config.min_cooldown);
                inner.cooldown = cooldown;
                inner.sleep_until = Some(Instant::now() + cooldown);
            }
            RateLimitState::HalfOpen => {
                let rate = inner.bucket.refill_rate().min(3.0).max(1.0);
                inner.bucket.reconfigure(self.config.capacity, rate);
                resize_semaphore(&mut inner.semaphore, 1);
                inner.sleep_until = None;
            }
            RateLimitState::CacheOnly => {
                inner.sleep_until = None;
            }
        }

        self.observer.on_transition(from, target);
    }
}

fn candidate_trigger(inner: &Inner) -> Option<Trigger> {
    match inner.state {
        RateLimitState::Normal => {
            if inner.window.error_ratio() >= 0.20 || inner.consecutive_429 >= 3 {
                Some(Trigger::NormalToThrottle)
            } else {
                None
            }
        }
        RateLimitState::Throttle => {
            if inner.successes_in_state >= 10 && inner.window.error_ratio() < 0.10 {
                Some(Trigger::ThrottleToHalfOpen)
            } else if inner.consecutive_429 >= 5 || inner.window.error_ratio() >= 0.60 {
                Some(Trigger::ThrottleToSleep)
            } else {
                None
            }
        }
        RateLimitState::HalfOpen => {
            if inner.successes_in_state >= 5 {
                Some(Trigger::HalfOpenToNormal)
            } else {
                None
            }
        }
        RateLimitState::Sleep | RateLimitState::CacheOnly => None,
    }
}

fn resolve_trigger(trigger: Trigger, cooldown: Duration) -> (RateLimitState, Option<Duration>) {
    match trigger {
        Trigger::NormalToThrottle => (RateLimitState::Throttle, None),
        Trigger::ThrottleToHalfOpen => (RateLimitState::HalfOpen, None),
        Trigger::ThrottleToSleep => (RateLimitState::Sleep, Some(cooldown)),
        Trigger::HalfOpenToNormal => (RateLimitState::Normal, None),
    }
}

/// Swaps in a freshly-sized semaphore. Permits already held by in-flight
/// requests keep the old `Arc` alive until they're released; new
/// acquisitions see the new limit immediately.
fn resize_semaphore(slot: &mut Arc<Semaphore>, permits: usize) {
    *slot = Arc::new(Semaphore::new(permits));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingObserver {
        transitions: StdMutex<Vec<(RateLimitState, RateLimitState)>>,
    }

    impl RateLimiterObserver for RecordingObserver {
        fn on_transition(&self, from: RateLimitState, to: RateLimitState) {
            self.transitions.lock().unwrap().push((from, to));
        }
    }

    fn test_config() -> RateLimiterConfig {
        RateLimiterConfig {
            capacity: 10.0,
            refill_rate: 10.0,
            base_permits: 4,
            semaphore_timeout: Duration::from_secs(5),
            min_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn requires_two_successive_evaluations_before_throttling() {
        let observer = Arc::new(RecordingObserver::default());
        let limiter = RateLimiter::with_observer(test_config(), observer.clone());

        // Prime the window with healthy traffic so the error-ratio trigger
        // stays below threshold; only the consecutive-429 trigger fires.
        for _ in 0..20 {
            limiter.record_outcome(ResponseOutcome::Success, None).await;
        }

        for _ in 0..3 {
            limiter
                .record_outcome(ResponseOutcome::TooManyRequests, None)
                .await;
        }
        assert_eq!(limiter.state().await, RateLimitState::Normal);

        limiter
            .record_outcome(ResponseOutcome::TooManyRequests, None)
            .await;
        assert_eq!(limiter.state().await, RateLimitState::Throttle);
        assert_eq!(
            observer.transitions.lock().unwrap().as_slice(),
            &[(RateLimitState::Normal, RateLimitState::Throttle)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_reverts_to_sleep_on_any_failure() {
        let limiter = RateLimiter::new(test_config());
        {
            let mut inner = limiter.inner.lock().await;
            inner.state = RateLimitState::HalfOpen;
        }
        limiter
            .record_outcome(ResponseOutcome::ServerError, None)
            .await;
        assert_eq!(limiter.state().await, RateLimitState::Sleep);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_while_asleep_then_recovers_after_timer() {
        let limiter = RateLimiter::new(test_config());
        {
            let mut inner = limiter.inner.lock().await;
            inner.state = RateLimitState::Sleep;
            inner.sleep_until = Some(Instant::now() + Duration::from_secs(5));
        }

        let deadline = Instant::now() + Duration::from_secs(1);
        let result = limiter.acquire(deadline).await;
        assert!(matches!(
            result,
            Err(EngineError::Blocked {
                state: BlockedState::Sleep,
                ..
            })
        ));

        tokio::time::advance(Duration::from_secs(6)).await;
        let deadline = Instant::now() + Duration::from_secs(1);
        let permit = limiter.acquire(deadline).await;
        assert!(permit.is_ok());
        assert_eq!(limiter.state().await, RateLimitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_only_is_manual_until_exited() {
        let limiter = RateLimiter::new(test_config());
        limiter.enter_cache_only().await;
        assert_eq!(limiter.state().await, RateLimitState::CacheOnly);

        let deadline = Instant::now() + Duration::from_secs(1);
        assert!(matches!(
            limiter.acquire(deadline).await,
            Err(EngineError::Blocked {
                state: BlockedState::CacheOnly,
                ..
            })
        ));

        limiter.exit_cache_only().await;
        assert_eq!(limiter.state().await, RateLimitState::Sleep);
    }
}
