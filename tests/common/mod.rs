//! Shared fakes for integration tests.
//!
//! Every fake counts its calls so tests can assert that a pass made no
//! external requests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use siteaudit::adapters::{AiApi, AiService, CrawlSource, KeywordApi, KeywordService};
use siteaudit::components::{default_registry, Services};
use siteaudit::core::{PipelineRunner, PipelineSettings, StateStore};
use siteaudit::domain::{
    BriefRequest, CallFailure, Competitor, ContentBrief, CrawlSnapshot, KeywordCluster,
    KeywordDatum, PageRecord, RankedKeyword, RankedKeywordOptions, SearchIntent, SerpResult,
};
use siteaudit::resilience::{
    BreakerSettings, CacheSettings, CircuitBreaker, Clock, ManualClock, ResponseCache, RetryPolicy,
};

pub fn server_error() -> CallFailure {
    CallFailure::Status {
        status: 503,
        message: "unavailable".to_string(),
    }
}

fn page(url: &str, title: &str, h1: &str, words: u32) -> PageRecord {
    PageRecord {
        url: url.to_string(),
        title: Some(title.to_string()),
        meta_description: Some(format!("About {}", title)),
        h1: Some(h1.to_string()),
        content: String::new(),
        outbound_links: Vec::new(),
        word_count: words,
        status_code: 200,
    }
}

pub fn sample_snapshot() -> CrawlSnapshot {
    CrawlSnapshot {
        pages: vec![
            page("https://example.com/", "Running Shoes", "Running Shoes", 900),
            page("https://example.com/trail", "Trail Running Shoes", "Trail Shoes", 150),
            page("https://example.com/boots", "Hiking Boots", "Waterproof Hiking Boots", 700),
        ],
        has_robots_txt: true,
        has_sitemap: false,
        redirect_chains: Vec::new(),
    }
}

/// Crawler that fails its first `failures` calls
#[derive(Default)]
pub struct FakeCrawler {
    pub failures: AtomicU32,
    pub calls: AtomicU32,
}

impl FakeCrawler {
    pub fn failing(times: u32) -> Self {
        Self {
            failures: AtomicU32::new(times),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CrawlSource for FakeCrawler {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch(&self, _site_url: &str) -> anyhow::Result<CrawlSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("crawler unavailable");
        }
        Ok(sample_snapshot())
    }
}

/// Keyword API; `ranking_failures` makes the first ranked-keyword calls fail
#[derive(Default)]
pub struct FakeKeywordApi {
    pub calls: AtomicU32,
    pub ranking_failures: AtomicU32,
}

#[async_trait]
impl KeywordApi for FakeKeywordApi {
    fn name(&self) -> &str {
        "fake"
    }

    async fn keyword_data(
        &self,
        keywords: &[String],
        _locale: &str,
    ) -> Result<Vec<KeywordDatum>, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(keywords
            .iter()
            .map(|k| KeywordDatum {
                keyword: k.clone(),
                search_volume: 100 * k.len() as u64,
                difficulty: 40,
                cpc: 0.8,
            })
            .collect())
    }

    async fn serp_results(&self, keyword: &str, _locale: &str) -> Result<Vec<SerpResult>, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![SerpResult {
            position: 1,
            url: "https://rival.com/guide".to_string(),
            title: format!("The {} guide", keyword),
            domain: "rival.com".to_string(),
        }])
    }

    async fn domain_ranked_keywords(
        &self,
        _domain: &str,
        _options: &RankedKeywordOptions,
    ) -> Result<Vec<RankedKeyword>, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .ranking_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(server_error());
        }
        Ok(vec![
            RankedKeyword {
                keyword: "running shoes".to_string(),
                position: 3,
                url: "https://example.com/".to_string(),
                search_volume: 5000,
            },
            RankedKeyword {
                keyword: "trail shoes".to_string(),
                position: 9,
                url: "https://example.com/trail".to_string(),
                search_volume: 1200,
            },
        ])
    }

    async fn discover_competitors(
        &self,
        _domain: &str,
        _locale: &str,
    ) -> Result<Vec<Competitor>, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Competitor {
            domain: "rival.com".to_string(),
            common_keywords: 42,
            average_position: 5.5,
        }])
    }
}

#[derive(Default)]
pub struct FakeAiApi {
    pub calls: AtomicU32,
}

#[async_trait]
impl AiApi for FakeAiApi {
    fn name(&self) -> &str {
        "fake"
    }

    async fn cluster_keywords(&self, keywords: &[String]) -> Result<Vec<KeywordCluster>, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![KeywordCluster {
            topic: "footwear".to_string(),
            keywords: keywords.to_vec(),
        }])
    }

    async fn classify_intent(&self, _keyword: &str) -> Result<SearchIntent, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SearchIntent::Commercial)
    }

    async fn generate_brief(&self, request: &BriefRequest) -> Result<ContentBrief, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ContentBrief {
            keyword: request.keyword.clone(),
            title: format!("Everything about {}", request.keyword),
            outline: vec!["Overview".to_string(), "Buying guide".to_string()],
            target_word_count: 1800,
        })
    }
}

/// Runner wired to fakes, plus handles to inspect them
pub struct Harness {
    pub runner: PipelineRunner,
    pub clock: Arc<ManualClock>,
    pub crawler: Arc<FakeCrawler>,
    pub keywords: Arc<FakeKeywordApi>,
    pub ai: Arc<FakeAiApi>,
}

impl Harness {
    pub fn new(store: Arc<dyn StateStore>, crawler: FakeCrawler, keywords: FakeKeywordApi) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let crawler = Arc::new(crawler);
        let keywords = Arc::new(keywords);
        let ai = Arc::new(FakeAiApi::default());

        // No retries inside a pass: the tests exercise retries across passes
        let policy = RetryPolicy {
            max_retries: 0,
            ..Default::default()
        };
        let breaker = |name: &str| {
            Arc::new(CircuitBreaker::new(
                name,
                policy.clone(),
                BreakerSettings::default(),
                dyn_clock.clone(),
            ))
        };

        let services = Services {
            crawler: crawler.clone(),
            keywords: KeywordService::new(
                keywords.clone(),
                breaker("keywords"),
                Arc::new(ResponseCache::new("keywords", CacheSettings::default(), dyn_clock.clone())),
                "en-US",
            ),
            ai: AiService::new(ai.clone(), breaker("ai")),
        };

        let runner = PipelineRunner::new(
            default_registry().unwrap(),
            store,
            services,
            dyn_clock.clone(),
            PipelineSettings::default(),
        );

        Self {
            runner,
            clock,
            crawler,
            keywords,
            ai,
        }
    }

    /// Total calls to every fake
    pub fn external_calls(&self) -> u32 {
        self.crawler.calls.load(Ordering::SeqCst)
            + self.keywords.calls.load(Ordering::SeqCst)
            + self.ai.calls.load(Ordering::SeqCst)
    }
}
