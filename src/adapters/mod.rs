//! Adapter interfaces for external systems.
//!
//! Three collaborators feed the pipeline:
//! - the crawler ([`CrawlSource`]), read directly
//! - the keyword-intelligence service ([`KeywordApi`]), behind
//!   [`KeywordService`] which adds the breaker, retries and the cache
//! - the generative-AI service ([`AiApi`]), behind [`AiService`] which adds
//!   the breaker and retries (no caching)
//!
//! The raw traits report unclassified [`CallFailure`]s; the services turn
//! them into [`ApiResult`](crate::domain::ApiResult)s.

pub mod ai;
pub mod crawler;
pub mod http;
pub mod keywords;
pub mod usage;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{
    BriefRequest, CallFailure, Competitor, ContentBrief, CrawlSnapshot,
    KeywordCluster, KeywordDatum, RankedKeyword, RankedKeywordOptions, SearchIntent, SerpResult,
};

pub use ai::{AiService, HttpAiApi};
pub use crawler::FileCrawlSource;
pub use http::HttpJsonClient;
pub use keywords::{CachedResponse, HttpKeywordApi, KeywordService};
pub use usage::UsageMeter;

/// Source of crawl data for a site
#[async_trait]
pub trait CrawlSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Pages and site metadata for `site_url`
    async fn fetch(&self, site_url: &str) -> Result<CrawlSnapshot>;
}

/// Raw keyword-intelligence transport
#[async_trait]
pub trait KeywordApi: Send + Sync {
    fn name(&self) -> &str;

    async fn keyword_data(
        &self,
        keywords: &[String],
        locale: &str,
    ) -> std::result::Result<Vec<KeywordDatum>, CallFailure>;

    async fn serp_results(
        &self,
        keyword: &str,
        locale: &str,
    ) -> std::result::Result<Vec<SerpResult>, CallFailure>;

    async fn domain_ranked_keywords(
        &self,
        domain: &str,
        options: &RankedKeywordOptions,
    ) -> std::result::Result<Vec<RankedKeyword>, CallFailure>;

    async fn discover_competitors(
        &self,
        domain: &str,
        locale: &str,
    ) -> std::result::Result<Vec<Competitor>, CallFailure>;
}

/// Raw generative-AI transport (prompt in, structured JSON out)
#[async_trait]
pub trait AiApi: Send + Sync {
    fn name(&self) -> &str;

    async fn cluster_keywords(
        &self,
        keywords: &[String],
    ) -> std::result::Result<Vec<KeywordCluster>, CallFailure>;

    async fn classify_intent(&self, keyword: &str) -> std::result::Result<SearchIntent, CallFailure>;

    async fn generate_brief(
        &self,
        request: &BriefRequest,
    ) -> std::result::Result<ContentBrief, CallFailure>;
}
