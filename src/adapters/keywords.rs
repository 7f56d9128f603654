//! Keyword-intelligence adapter.
//!
//! [`HttpKeywordApi`] speaks to the provider; [`KeywordService`] is what
//! components use. The service routes every call through the shared
//! breaker and caches keyword data, SERP results and competitor discovery.
//! Ranked-keyword queries are never cached.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::domain::{
    ApiResult, CallFailure, Competitor, KeywordDatum, RankedKeyword,
    RankedKeywordOptions, SerpResult,
};
use crate::resilience::{cache_key, CircuitBreaker, ResponseCache};

use super::http::HttpJsonClient;
use super::usage::{Dependency, UsageMeter};
use super::KeywordApi;

/// Keyword-intelligence provider over HTTP
pub struct HttpKeywordApi {
    http: HttpJsonClient,
}

impl HttpKeywordApi {
    pub fn new(http: HttpJsonClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl KeywordApi for HttpKeywordApi {
    fn name(&self) -> &str {
        "keywords"
    }

    async fn keyword_data(
        &self,
        keywords: &[String],
        locale: &str,
    ) -> Result<Vec<KeywordDatum>, CallFailure> {
        self.http
            .post("keywords/data", &json!({ "keywords": keywords, "locale": locale }))
            .await
    }

    async fn serp_results(&self, keyword: &str, locale: &str) -> Result<Vec<SerpResult>, CallFailure> {
        self.http
            .post("serp", &json!({ "keyword": keyword, "locale": locale }))
            .await
    }

    async fn domain_ranked_keywords(
        &self,
        domain: &str,
        options: &RankedKeywordOptions,
    ) -> Result<Vec<RankedKeyword>, CallFailure> {
        self.http
            .post(
                "domain/ranked-keywords",
                &json!({ "domain": domain, "options": options }),
            )
            .await
    }

    async fn discover_competitors(
        &self,
        domain: &str,
        locale: &str,
    ) -> Result<Vec<Competitor>, CallFailure> {
        self.http
            .post("domain/competitors", &json!({ "domain": domain, "locale": locale }))
            .await
    }
}

/// Values held in the keyword dependency's cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResponse {
    KeywordData(Vec<KeywordDatum>),
    Serp(Vec<SerpResult>),
    Competitors(Vec<Competitor>),
}

/// Guarded, cached access to keyword intelligence
pub struct KeywordService {
    api: Arc<dyn KeywordApi>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<ResponseCache<CachedResponse>>,
    locale: String,
}

impl KeywordService {
    pub fn new(
        api: Arc<dyn KeywordApi>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<ResponseCache<CachedResponse>>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            api,
            breaker,
            cache,
            locale: locale.into(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &ResponseCache<CachedResponse> {
        &self.cache
    }

    /// Search metrics for a batch of keywords
    pub async fn keyword_data(
        &self,
        meter: &UsageMeter,
        keywords: &[String],
    ) -> ApiResult<Vec<KeywordDatum>> {
        let mut parts: Vec<&str> = keywords.iter().map(String::as_str).collect();
        parts.sort_unstable();
        let key = cache_key("keyword_data", &self.locale, &parts);

        if let Some(CachedResponse::KeywordData(data)) = self.lookup(meter, &key) {
            return Ok(data);
        }

        let data = meter
            .guarded(Dependency::Keywords, &self.breaker, || {
                self.api.keyword_data(keywords, &self.locale)
            })
            .await?;
        self.cache.set(key, CachedResponse::KeywordData(data.clone()));
        Ok(data)
    }

    /// Organic results for one keyword
    pub async fn serp_results(&self, meter: &UsageMeter, keyword: &str) -> ApiResult<Vec<SerpResult>> {
        let key = cache_key("serp", &self.locale, &[keyword]);

        if let Some(CachedResponse::Serp(results)) = self.lookup(meter, &key) {
            return Ok(results);
        }

        let results = meter
            .guarded(Dependency::Keywords, &self.breaker, || {
                self.api.serp_results(keyword, &self.locale)
            })
            .await?;
        self.cache.set(key, CachedResponse::Serp(results.clone()));
        Ok(results)
    }

    /// Keywords `domain` currently ranks for (always fetched fresh)
    pub async fn domain_ranked_keywords(
        &self,
        meter: &UsageMeter,
        domain: &str,
        limit: u32,
    ) -> ApiResult<Vec<RankedKeyword>> {
        let options = RankedKeywordOptions {
            locale: self.locale.clone(),
            limit,
            max_position: None,
        };
        meter
            .guarded(Dependency::Keywords, &self.breaker, || {
                self.api.domain_ranked_keywords(domain, &options)
            })
            .await
    }

    /// Domains competing with `domain`
    pub async fn discover_competitors(
        &self,
        meter: &UsageMeter,
        domain: &str,
    ) -> ApiResult<Vec<Competitor>> {
        let key = cache_key("competitors", &self.locale, &[domain]);

        if let Some(CachedResponse::Competitors(competitors)) = self.lookup(meter, &key) {
            return Ok(competitors);
        }

        let competitors = meter
            .guarded(Dependency::Keywords, &self.breaker, || {
                self.api.discover_competitors(domain, &self.locale)
            })
            .await?;
        self.cache.set(key, CachedResponse::Competitors(competitors.clone()));
        Ok(competitors)
    }

    fn lookup(&self, meter: &UsageMeter, key: &str) -> Option<CachedResponse> {
        let hit = self.cache.get(key);
        meter.record_cache(hit.is_some());
        if hit.is_some() {
            debug!(%key, "Keyword cache hit");
        }
        hit
    }
}
