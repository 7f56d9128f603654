//! Resilience Layer Tests
//!
//! Breaker, cache and bounded fan-out as seen by callers of the keyword
//! service, with a manual clock standing in for wall time.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};

use siteaudit::adapters::{KeywordApi, KeywordService, UsageMeter};
use siteaudit::domain::{
    CallFailure, Competitor, ErrorKind, KeywordDatum, RankedKeyword, RankedKeywordOptions,
    SerpResult,
};
use siteaudit::resilience::{
    partition_outcomes, run_bounded, BreakerSettings, CacheSettings, CircuitBreaker, CircuitState,
    Clock, ManualClock, ResponseCache, RetryPolicy,
};

/// Provider that fails with a 503 while `down` is set
#[derive(Default)]
struct OutageApi {
    down: AtomicBool,
    calls: AtomicU32,
}

impl OutageApi {
    fn respond<T>(&self, value: T) -> Result<T, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(CallFailure::Status {
                status: 503,
                message: "maintenance".to_string(),
            });
        }
        Ok(value)
    }
}

#[async_trait]
impl KeywordApi for OutageApi {
    fn name(&self) -> &str {
        "outage"
    }

    async fn keyword_data(
        &self,
        keywords: &[String],
        _locale: &str,
    ) -> Result<Vec<KeywordDatum>, CallFailure> {
        self.respond(
            keywords
                .iter()
                .map(|k| KeywordDatum {
                    keyword: k.clone(),
                    search_volume: 500,
                    difficulty: 30,
                    cpc: 1.0,
                })
                .collect(),
        )
    }

    async fn serp_results(&self, _keyword: &str, _locale: &str) -> Result<Vec<SerpResult>, CallFailure> {
        self.respond(Vec::new())
    }

    async fn domain_ranked_keywords(
        &self,
        _domain: &str,
        _options: &RankedKeywordOptions,
    ) -> Result<Vec<RankedKeyword>, CallFailure> {
        self.respond(Vec::new())
    }

    async fn discover_competitors(
        &self,
        _domain: &str,
        _locale: &str,
    ) -> Result<Vec<Competitor>, CallFailure> {
        self.respond(vec![Competitor {
            domain: "rival.com".to_string(),
            common_keywords: 12,
            average_position: 7.0,
        }])
    }
}

struct Fixture {
    api: Arc<OutageApi>,
    clock: Arc<ManualClock>,
    breaker: Arc<CircuitBreaker>,
    service: KeywordService,
}

fn fixture(threshold: u32, cache: CacheSettings) -> Fixture {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let api = Arc::new(OutageApi::default());

    let policy = RetryPolicy {
        max_retries: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
        jitter_ms: 0,
        attempt_timeout_ms: 1_000,
    };
    let breaker = Arc::new(CircuitBreaker::new(
        "keywords",
        policy,
        BreakerSettings {
            threshold,
            reset_window_secs: 60,
        },
        dyn_clock.clone(),
    ));
    let service = KeywordService::new(
        api.clone(),
        breaker.clone(),
        Arc::new(ResponseCache::new("keywords", cache, dyn_clock)),
        "en-US",
    );

    Fixture {
        api,
        clock,
        breaker,
        service,
    }
}

#[tokio::test]
async fn test_open_breaker_short_circuits_every_operation() {
    let f = fixture(5, CacheSettings::default());
    let meter = UsageMeter::new();
    f.api.down.store(true, Ordering::SeqCst);

    for _ in 0..5 {
        assert_err!(f.service.domain_ranked_keywords(&meter, "example.com", 100).await);
    }
    assert_eq!(f.api.calls.load(Ordering::SeqCst), 5);
    assert_eq!(f.breaker.snapshot().state, CircuitState::Open);

    // A different operation on the same dependency is rejected without I/O
    let err = f.service.serp_results(&meter, "running shoes").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::CircuitOpen);
    assert_eq!(f.api.calls.load(Ordering::SeqCst), 5);

    let usage = meter.snapshot();
    assert_eq!(usage.keyword_requests, 5);
    assert_eq!(usage.failed_calls, 5);
    assert_eq!(usage.short_circuits, 1);

    // The provider recovers; still rejected until the window passes
    f.api.down.store(false, Ordering::SeqCst);
    f.clock.advance(Duration::from_secs(30));
    assert_err!(f.service.domain_ranked_keywords(&meter, "example.com", 100).await);
    assert_eq!(f.api.calls.load(Ordering::SeqCst), 5);

    f.clock.advance(Duration::from_secs(31));
    assert_ok!(f.service.domain_ranked_keywords(&meter, "example.com", 100).await);
    assert_eq!(f.api.calls.load(Ordering::SeqCst), 6);
    assert_eq!(f.breaker.snapshot().state, CircuitState::Closed);
}

#[tokio::test]
async fn test_success_resets_consecutive_failures() {
    let f = fixture(3, CacheSettings::default());
    let meter = UsageMeter::new();

    f.api.down.store(true, Ordering::SeqCst);
    for _ in 0..2 {
        assert_err!(f.service.domain_ranked_keywords(&meter, "example.com", 10).await);
    }
    f.api.down.store(false, Ordering::SeqCst);
    assert_ok!(f.service.domain_ranked_keywords(&meter, "example.com", 10).await);

    f.api.down.store(true, Ordering::SeqCst);
    for _ in 0..2 {
        assert_err!(f.service.domain_ranked_keywords(&meter, "example.com", 10).await);
    }

    let snapshot = f.breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 2);
}

#[tokio::test]
async fn test_cached_response_expires_after_ttl() {
    let f = fixture(
        5,
        CacheSettings {
            ttl_secs: 300,
            max_entries: 10,
        },
    );
    let meter = UsageMeter::new();

    let first = f.service.discover_competitors(&meter, "example.com").await.unwrap();
    f.clock.advance(Duration::from_secs(299));
    let second = f.service.discover_competitors(&meter, "example.com").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(f.api.calls.load(Ordering::SeqCst), 1);

    f.clock.advance(Duration::from_secs(1));
    assert_ok!(f.service.discover_competitors(&meter, "example.com").await);
    assert_eq!(f.api.calls.load(Ordering::SeqCst), 2);

    let usage = meter.snapshot();
    assert_eq!(usage.cache_hits, 1);
    assert_eq!(usage.cache_misses, 2);
    assert_eq!(f.service.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_cache_serves_during_outage() {
    let f = fixture(5, CacheSettings::default());
    let meter = UsageMeter::new();
    let keywords = vec!["trail shoes".to_string(), "hiking boots".to_string()];

    assert_ok!(f.service.keyword_data(&meter, &keywords).await);
    f.api.down.store(true, Ordering::SeqCst);

    // Same batch in a different order is the same query
    let reordered = vec!["hiking boots".to_string(), "trail shoes".to_string()];
    let data = f.service.keyword_data(&meter, &reordered).await.unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(f.api.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cache_evicts_oldest_beyond_capacity() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let cache: ResponseCache<u32> = ResponseCache::new(
        "test",
        CacheSettings {
            ttl_secs: 300,
            max_entries: 3,
        },
        clock.clone(),
    );

    for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
        cache.set(*key, i as u32);
        clock.advance(Duration::from_secs(1));
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(1));
    assert_eq!(cache.get("d"), Some(3));

    // Expired entries go first, even if newer ones would otherwise be kept
    clock.advance(Duration::from_secs(298));
    cache.prune();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("d"), Some(3));
}

#[tokio::test]
async fn test_bounded_fan_out_limits_in_flight_and_isolates_failures() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let items: Vec<usize> = (0..20).collect();
    let outcomes = run_bounded(items, 4, |i| {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5 + (i % 3) as u64)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);

            if i % 5 == 0 {
                Err(format!("task {} failed", i))
            } else {
                Ok(i * 10)
            }
        }
    })
    .await;

    assert_eq!(outcomes.len(), 20);
    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert!(peak.load(Ordering::SeqCst) >= 2);

    let (ok, failed) = partition_outcomes(outcomes);
    assert_eq!(ok.len(), 16);
    assert_eq!(
        failed.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
        vec![0, 5, 10, 15]
    );
    assert_eq!(failed[1].1, "task 5 failed");
    assert!(ok.iter().all(|(i, value)| *value == i * 10));
}
