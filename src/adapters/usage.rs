//! Per-pass API usage counters.
//!
//! Services record into a [`UsageMeter`]; the orchestrator drains it into
//! [`ApiUsage`] after each component so usage is persisted with the state.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{ApiResult, ApiUsage, CallFailure, ErrorKind};
use crate::resilience::CircuitBreaker;

/// Which external dependency a request went to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Keywords,
    Ai,
}

/// Lock-free usage counters shared by concurrent tasks
#[derive(Debug, Default)]
pub struct UsageMeter {
    keyword_requests: AtomicU64,
    ai_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    short_circuits: AtomicU64,
    failed_calls: AtomicU64,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// One network attempt was made
    pub fn record_request(&self, dependency: Dependency) {
        let counter = match dependency {
            Dependency::Keywords => &self.keyword_requests,
            Dependency::Ai => &self.ai_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache(&self, hit: bool) {
        let counter = if hit {
            &self.cache_hits
        } else {
            &self.cache_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_short_circuit(&self) {
        self.short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Run `op` through `breaker`, counting every attempt against
    /// `dependency` and the final outcome as a failure or short-circuit
    pub async fn guarded<T, F, Fut>(
        &self,
        dependency: Dependency,
        breaker: &CircuitBreaker,
        mut op: F,
    ) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallFailure>>,
    {
        let result = breaker
            .call(|| {
                self.record_request(dependency);
                op()
            })
            .await;

        if let Err(ref err) = result {
            if err.kind == ErrorKind::CircuitOpen {
                self.record_short_circuit();
            } else {
                self.record_failure();
            }
        }
        result
    }

    /// Current totals without resetting
    pub fn snapshot(&self) -> ApiUsage {
        ApiUsage {
            keyword_requests: self.keyword_requests.load(Ordering::Relaxed),
            ai_requests: self.ai_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
        }
    }

    /// Current totals, resetting every counter to zero
    pub fn take(&self) -> ApiUsage {
        ApiUsage {
            keyword_requests: self.keyword_requests.swap(0, Ordering::Relaxed),
            ai_requests: self.ai_requests.swap(0, Ordering::Relaxed),
            cache_hits: self.cache_hits.swap(0, Ordering::Relaxed),
            cache_misses: self.cache_misses.swap(0, Ordering::Relaxed),
            short_circuits: self.short_circuits.swap(0, Ordering::Relaxed),
            failed_calls: self.failed_calls.swap(0, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resilience::{BreakerSettings, RetryPolicy, SystemClock};

    #[test]
    fn test_take_resets_counters() {
        let meter = UsageMeter::new();
        meter.record_request(Dependency::Keywords);
        meter.record_request(Dependency::Ai);
        meter.record_cache(true);
        meter.record_short_circuit();

        let usage = meter.take();
        assert_eq!(usage.keyword_requests, 1);
        assert_eq!(usage.ai_requests, 1);
        assert_eq!(usage.cache_hits, 1);
        assert_eq!(usage.short_circuits, 1);
        assert_eq!(meter.snapshot(), ApiUsage::default());
    }

    #[tokio::test]
    async fn test_guarded_counts_attempts_failures_and_short_circuits() {
        let breaker = CircuitBreaker::new(
            "ai",
            RetryPolicy {
                max_retries: 1,
                base_delay_ms: 0,
                max_delay_ms: 0,
                jitter_ms: 0,
                attempt_timeout_ms: 1_000,
            },
            BreakerSettings {
                threshold: 1,
                reset_window_secs: 60,
            },
            Arc::new(SystemClock),
        );
        let meter = UsageMeter::new();

        let failed: ApiResult<()> = meter
            .guarded(Dependency::Ai, &breaker, || async {
                Err(CallFailure::Status {
                    status: 503,
                    message: "down".to_string(),
                })
            })
            .await;
        assert_eq!(failed.unwrap_err().kind, ErrorKind::ServerError);

        let rejected: ApiResult<()> = meter.guarded(Dependency::Ai, &breaker, || async { Ok(()) }).await;
        assert_eq!(rejected.unwrap_err().kind, ErrorKind::CircuitOpen);

        let usage = meter.snapshot();
        assert_eq!(usage.ai_requests, 2);
        assert_eq!(usage.keyword_requests, 0);
        assert_eq!(usage.failed_calls, 1);
        assert_eq!(usage.short_circuits, 1);
    }
}
