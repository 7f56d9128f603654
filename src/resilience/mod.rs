//! Resilience layer for external dependencies.
//!
//! - Clock: injectable time source
//! - CircuitBreaker: retry with backoff plus consecutive-failure breaker
//! - ResponseCache: short-TTL, size-bounded lookup cache
//! - Concurrency: bounded fan-out of independent tasks

pub mod breaker;
pub mod cache;
pub mod clock;
pub mod concurrency;

pub use breaker::{BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState, RetryPolicy};
pub use cache::{cache_key, CacheEntry, CacheSettings, CacheStats, ResponseCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use concurrency::{partition_outcomes, run_bounded, run_bounded_streaming, TaskOutcome};
