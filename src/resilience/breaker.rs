//! Circuit breaker with retry for external calls.
//!
//! One [`CircuitBreaker`] guards one external dependency and is shared by
//! every caller of that dependency. A call goes through three stages:
//!
//! 1. Admission: an open breaker rejects the call with `circuit_open`
//!    until its reset window has elapsed, then closes again.
//! 2. Attempts: up to `max_retries + 1` tries with exponential backoff and
//!    jitter between retriable failures.
//! 3. Accounting: a call that ends in failure bumps the consecutive-failure
//!    count; reaching the threshold opens the breaker.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::domain::{ApiError, ApiResult, CallFailure, ErrorKind};

use super::clock::{elapsed_since, Clock};

/// Retry policy for one guarded call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound on the backoff delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Random extra delay added to each backoff, 0..=jitter_ms
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,

    /// Time allowed for a single attempt in milliseconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30_000
}
fn default_jitter() -> u64 {
    500
}
fn default_attempt_timeout() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: default_jitter(),
            attempt_timeout_ms: default_attempt_timeout(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after `attempt` (0-indexed) failed, without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Backoff including a random jitter
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter_ms == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=self.jitter_ms);
        base + Duration::from_millis(jitter)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failed calls that open the breaker
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// How long an open breaker rejects calls, in seconds
    #[serde(default = "default_reset_window")]
    pub reset_window_secs: u64,
}

fn default_threshold() -> u32 {
    5
}
fn default_reset_window() -> u64 {
    60
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            reset_window_secs: default_reset_window(),
        }
    }
}

impl BreakerSettings {
    pub fn reset_window(&self) -> Duration {
        Duration::from_secs(self.reset_window_secs)
    }
}

/// Whether the breaker lets calls through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
}

/// Point-in-time view of a breaker, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

/// Retry wrapper and consecutive-failure breaker for one dependency
pub struct CircuitBreaker {
    name: String,
    policy: RetryPolicy,
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        policy: RetryPolicy,
        settings: BreakerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            settings,
            clock,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            opened_at: state.opened_at,
        }
    }

    /// Run `op` under the retry policy and the breaker.
    ///
    /// `op` is invoked once per attempt and must be safe to repeat.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallFailure>>,
    {
        self.admit()?;

        let mut attempt = 0u32;
        loop {
            let failure = match tokio::time::timeout(self.policy.attempt_timeout(), op()).await {
                Ok(Ok(value)) => {
                    self.record_success();
                    return Ok(value);
                }
                Ok(Err(failure)) => failure,
                Err(_) => CallFailure::Timeout,
            };

            let err = failure.classify();
            match err.kind {
                // Credentials won't heal by waiting, but they do count
                ErrorKind::AuthError => {
                    self.record_failure();
                    return Err(err);
                }
                // Caller-side errors say nothing about the dependency's health
                ErrorKind::Unknown => {
                    debug!(breaker = %self.name, error = %err, "Non-retriable client error");
                    return Err(err);
                }
                _ => {}
            }

            if attempt >= self.policy.max_retries {
                self.record_failure();
                return Err(err);
            }

            let delay = self.policy.jittered_delay(attempt);
            warn!(
                breaker = %self.name,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "External call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Reject the call if open; lazily close once the window has passed
    fn admit(&self) -> ApiResult<()> {
        let now = self.clock.now();
        let mut state = self.lock();

        if state.state == CircuitState::Open {
            let opened_at = state.opened_at.unwrap_or(now);
            if elapsed_since(now, opened_at) < self.settings.reset_window() {
                return Err(ApiError::new(
                    ErrorKind::CircuitOpen,
                    format!("Circuit '{}' is open", self.name),
                ));
            }

            info!(breaker = %self.name, "Reset window elapsed, closing circuit");
            state.state = CircuitState::Closed;
            state.consecutive_failures = 0;
            state.opened_at = None;
        }

        Ok(())
    }

    fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    fn record_failure(&self) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.consecutive_failures += 1;

        if state.state == CircuitState::Closed
            && state.consecutive_failures >= self.settings.threshold
        {
            error!(
                breaker = %self.name,
                failures = state.consecutive_failures,
                "Failure threshold reached, opening circuit"
            );
            state.state = CircuitState::Open;
            state.opened_at = Some(now);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
