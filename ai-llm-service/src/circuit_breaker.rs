//! Circuit breaker guarding the LLM analyzer from hammering an overloaded
//! provider. Only overload-classified failures count toward the trip
//! threshold — a one-off decode error or a single rate-limit blip elsewhere
//! shouldn't open the breaker for unrelated callers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(300_000);
const DEFAULT_MAX_FAILURES: u32 = 2;

const OVERLOAD_MARKERS: &[&str] = &[
    "overload",
    "529",
    "rate limit",
    "tokens per minute",
    "too many requests",
    "quota exceeded",
];

/// Case-insensitive match against the provider overload vocabulary.
pub fn is_overload_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    OVERLOAD_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    is_open: bool,
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// A single breaker instance protects one logical downstream (one LLM
/// provider profile). Safe to share behind an `Arc` across concurrent
/// review jobs.
pub struct CircuitBreaker {
    reset_timeout: Duration,
    max_failures: u32,
    inner: Mutex<Inner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_TIMEOUT, DEFAULT_MAX_FAILURES)
    }
}

impl CircuitBreaker {
    pub fn new(reset_timeout: Duration, max_failures: u32) -> Self {
        Self {
            reset_timeout,
            max_failures,
            inner: Mutex::new(Inner {
                is_open: false,
                failure_count: 0,
                last_failure_time: None,
            }),
        }
    }

    /// Closed → allow. Open past the reset timeout → half-open, which
    /// closes the breaker and allows this one call through; the call's own
    /// outcome then decides whether it reopens. Open within the timeout →
    /// deny.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        if !inner.is_open {
            return true;
        }

        let elapsed = inner
            .last_failure_time
            .map(|t| t.elapsed())
            .unwrap_or(Duration::MAX);

        if elapsed > self.reset_timeout {
            inner.is_open = false;
            inner.failure_count = 0;
            true
        } else {
            false
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        inner.failure_count = 0;
    }

    /// Only `is_overload` failures move the counter; everything else is a
    /// no-op as far as the breaker is concerned.
    pub fn record_failure(&self, is_overload: bool) {
        if !is_overload {
            return;
        }
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());
        if inner.failure_count >= self.max_failures {
            inner.is_open = true;
        }
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock().expect("circuit breaker poisoned");
        if !inner.is_open {
            BreakerState::Closed
        } else {
            let elapsed = inner
                .last_failure_time
                .map(|t| t.elapsed())
                .unwrap_or(Duration::MAX);
            if elapsed > self.reset_timeout {
                BreakerState::HalfOpen
            } else {
                BreakerState::Open
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_classification_is_case_insensitive() {
        assert!(is_overload_error("Error 529: Overloaded"));
        assert!(is_overload_error("Too Many Requests"));
        assert!(is_overload_error("QUOTA EXCEEDED for this key"));
        assert!(!is_overload_error("invalid JSON in response body"));
    }

    #[test]
    fn opens_after_max_failures_and_denies_until_reset() {
        let breaker = CircuitBreaker::new(Duration::from_millis(50), 2);
        assert!(breaker.can_execute());
        breaker.record_failure(true);
        assert!(breaker.can_execute());
        breaker.record_failure(true);
        assert!(!breaker.can_execute());
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.can_execute());
    }

    #[test]
    fn non_overload_failures_never_trip_the_breaker() {
        let breaker = CircuitBreaker::new(Duration::from_secs(300), 2);
        breaker.record_failure(false);
        breaker.record_failure(false);
        breaker.record_failure(false);
        assert!(breaker.can_execute());
    }

    #[test]
    fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new(Duration::from_secs(300), 2);
        breaker.record_failure(true);
        breaker.record_success();
        breaker.record_failure(true);
        assert!(breaker.can_execute());
    }
}
